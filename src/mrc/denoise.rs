// MRC: page-level threshold pass with optional pre-blur and mask denoising

use std::time::Instant;

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use super::mask::Mask;
use super::noise::{estimate_sigma, estimate_sigma_gray};
use super::threshold::page_threshold;
use crate::error::Result;
use crate::telemetry::context::{PageContext, Stage};

/// Pages noisier than this are blurred before thresholding.
pub const PAGE_NOISE_CUTOFF: f32 = 1.0;

/// Pre-blur sigma as a fraction of the estimated page noise.
pub const PRE_BLUR_FACTOR: f32 = 0.1;

/// Threshold masks noisier than this are denoised when denoising is enabled.
pub const MASK_NOISE_CUTOFF: f32 = 0.1;

const TV_WEIGHT: f32 = 1.0;
const TV_EPS: f32 = 1e-3;
const TV_MAX_ITER: usize = 100;
const REBINARIZE_CUTOFF: f32 = 0.4;

/// Run the coarse page threshold and OR it into `mask`.
///
/// The page pass is computed and, when `denoise` is set, cleaned up on its
/// own, then merged with [`Mask::union_with`]. Pixels already decided by
/// the word pass are never cleared.
pub fn merge_page_threshold(
    mask: &mut Mask,
    gray: &GrayImage,
    denoise: bool,
    ctx: &mut PageContext,
) -> Result<()> {
    let started = Instant::now();
    let sigma = estimate_sigma_gray(gray);
    ctx.record(Stage::NoiseEstimate, started.elapsed());

    let blurred;
    let source = if sigma > PAGE_NOISE_CUTOFF {
        let started = Instant::now();
        blurred = gaussian_blur_f32(gray, sigma * PRE_BLUR_FACTOR);
        ctx.record(Stage::PreBlur, started.elapsed());
        debug!(sigma, "page pre-blurred");
        &blurred
    } else {
        gray
    };

    let started = Instant::now();
    let mut page = page_threshold(source);
    ctx.record(Stage::Threshold, started.elapsed());

    if denoise {
        let started = Instant::now();
        let mask_sigma = estimate_sigma(&page.to_f32(), page.width(), page.height());
        ctx.record(Stage::MaskNoiseEstimate, started.elapsed());

        if mask_sigma > MASK_NOISE_CUTOFF {
            let started = Instant::now();
            page = denoise_mask(&page);
            ctx.record(Stage::Denoise, started.elapsed());
            debug!(mask_sigma, "page threshold denoised");
        }
    }

    mask.union_with(&page)
}

/// Total-variation denoise a binary mask and re-binarize it.
pub fn denoise_mask(mask: &Mask) -> Mask {
    let (w, h) = mask.dimensions();
    let smoothed = denoise_tv_bregman(&mask.to_f32(), w, h, TV_WEIGHT, TV_EPS, TV_MAX_ITER);
    let bits = smoothed.iter().map(|&v| v > REBINARIZE_CUTOFF).collect();
    Mask::from_vec(w, h, bits)
}

/// Isotropic split-Bregman total-variation denoising.
///
/// Gauss-Seidel sweeps over a grid padded by one pixel on each side, stopped
/// after `max_iter` sweeps or once the RMS update falls to `eps`. Smaller
/// `weight` removes more.
pub fn denoise_tv_bregman(
    data: &[f32],
    width: u32,
    height: u32,
    weight: f32,
    eps: f32,
    max_iter: usize,
) -> Vec<f32> {
    let (rows, cols) = (height as usize, width as usize);
    if rows == 0 || cols == 0 {
        return data.to_vec();
    }
    let stride = cols + 2;
    let at = |r: usize, c: usize| r * stride + c;
    let src = |r: usize, c: usize| data[r * cols + c];

    let mut out = vec![0f32; (rows + 2) * stride];
    for r in 0..rows {
        for c in 0..cols {
            out[at(r + 1, c + 1)] = src(r, c);
        }
    }
    // Border rows/cols mirror the nearest interior line.
    let inner_row = |r: usize| if rows > 1 { r } else { 0 };
    let inner_col = |c: usize| if cols > 1 { c } else { 0 };
    for c in 0..cols {
        out[at(0, c + 1)] = src(inner_row(1), c);
        out[at(rows + 1, c + 1)] = src(rows - 1, c);
    }
    for r in 0..rows {
        out[at(r + 1, 0)] = src(r, inner_col(1));
        out[at(r + 1, cols + 1)] = src(r, cols - 1);
    }

    let mut dx = vec![0f32; out.len()];
    let mut dy = vec![0f32; out.len()];
    let mut bx = vec![0f32; out.len()];
    let mut by = vec![0f32; out.len()];

    let lam = 2.0 * weight;
    let norm = weight + 4.0 * lam;
    let total = (rows * cols) as f64;

    for _ in 0..max_iter {
        let mut sq_err = 0f64;
        for r in 1..=rows {
            for c in 1..=cols {
                let i = at(r, c);
                let prev = out[i];
                let ux = out[i + 1] - prev;
                let uy = out[i + stride] - prev;

                let next = (lam
                    * (out[i + stride] + out[i - stride] + out[i + 1] + out[i - 1]
                        + dx[i - 1]
                        - dx[i]
                        + dy[i - stride]
                        - dy[i]
                        - bx[i - 1]
                        + bx[i]
                        - by[i - stride]
                        + by[i])
                    + weight * src(r - 1, c - 1))
                    / norm;
                out[i] = next;

                let step = (next - prev) as f64;
                sq_err += step * step;

                let sx = ux + bx[i];
                let sy = uy + by[i];
                let s = (sx * sx + sy * sy).sqrt();
                let (dxx, dyy) = if s == 0.0 {
                    (0.0, 0.0)
                } else {
                    (s * lam * sx / (s * lam + 1.0), s * lam * sy / (s * lam + 1.0))
                };
                dx[i] = dxx;
                dy[i] = dyy;
                bx[i] += ux - dxx;
                by[i] += uy - dyy;
            }
        }
        if (sq_err / total).sqrt() <= eps as f64 {
            break;
        }
    }

    let mut result = Vec::with_capacity(rows * cols);
    for r in 1..=rows {
        result.extend_from_slice(&out[at(r, 1)..at(r, cols + 1)]);
    }
    result
}
