// MRC: content fill for foreground/background layers

use image::{DynamicImage, ImageBuffer, Pixel};

use super::mask::Mask;
use crate::error::{MrcError, Result};

/// Fill radius used when deriving the foreground layer.
pub const FOREGROUND_FILL_RADIUS: u32 = 3;

/// Fill radius used when deriving the background layer.
pub const BACKGROUND_FILL_RADIUS: u32 = 10;

/// Replaces the pixels outside a keep-mask with content extrapolated from
/// nearby kept pixels.
///
/// Implementations must be deterministic, must return kept pixels unchanged,
/// and must produce an image of the same size and color type as `source`.
pub trait ContentFill: Send + Sync {
    fn fill(&self, keep: &Mask, source: &DynamicImage, radius: u32) -> Result<DynamicImage>;
}

/// Normalized box-average fill.
///
/// Each unkept pixel becomes the mean of the kept pixels inside a
/// `(2r + 1)^2` window. Pixels with no kept neighbour retry with a doubled
/// window until the window spans the image. Without any kept pixel the
/// whole layer takes the mean color of the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedFill;

impl ContentFill for NormalizedFill {
    fn fill(&self, keep: &Mask, source: &DynamicImage, radius: u32) -> Result<DynamicImage> {
        if keep.dimensions() != (source.width(), source.height()) {
            return Err(MrcError::threshold(format!(
                "fill mask {}x{} does not match image {}x{}",
                keep.width(),
                keep.height(),
                source.width(),
                source.height()
            )));
        }
        Ok(match source {
            DynamicImage::ImageLuma8(img) => {
                DynamicImage::ImageLuma8(fill_buffer(img, keep, radius)?)
            }
            DynamicImage::ImageRgb8(img) => {
                DynamicImage::ImageRgb8(fill_buffer(img, keep, radius)?)
            }
            DynamicImage::ImageRgba8(img) => {
                DynamicImage::ImageRgba8(fill_buffer(img, keep, radius)?)
            }
            other if other.color().has_alpha() => {
                DynamicImage::ImageRgba8(fill_buffer(&other.to_rgba8(), keep, radius)?)
            }
            other => DynamicImage::ImageRgb8(fill_buffer(&other.to_rgb8(), keep, radius)?),
        })
    }
}

fn fill_buffer<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    keep: &Mask,
    radius: u32,
) -> Result<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = image.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let raw = fill_channels(image.as_raw(), channels, w as usize, h as usize, keep, radius);
    ImageBuffer::from_raw(w, h, raw)
        .ok_or_else(|| MrcError::threshold("filled buffer has unexpected length"))
}

fn fill_channels(
    raw: &[u8],
    channels: usize,
    w: usize,
    h: usize,
    keep: &Mask,
    radius: u32,
) -> Vec<u8> {
    let bits = keep.bits();
    let mut out = raw.to_vec();
    let mut pending: Vec<usize> = (0..w * h).filter(|&i| !bits[i]).collect();
    if pending.is_empty() {
        return out;
    }

    if pending.len() == w * h {
        for c in 0..channels {
            let sum: u64 = (0..w * h).map(|i| raw[i * channels + c] as u64).sum();
            let mean = (sum as f64 / (w * h) as f64).round() as u8;
            for i in 0..w * h {
                out[i * channels + c] = mean;
            }
        }
        return out;
    }

    let keep_f: Vec<f32> = bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
    let span = w.max(h);
    let mut r = (radius as usize).max(1);
    loop {
        let weights = box_sum(&keep_f, w, h, r);
        let (ready, waiting): (Vec<usize>, Vec<usize>) =
            pending.iter().partition(|&&i| weights[i] > 0.5);

        for c in 0..channels {
            let masked: Vec<f32> = (0..w * h)
                .map(|i| if bits[i] { raw[i * channels + c] as f32 } else { 0.0 })
                .collect();
            let sums = box_sum(&masked, w, h, r);
            for &i in &ready {
                out[i * channels + c] = (sums[i] / weights[i]).round().clamp(0.0, 255.0) as u8;
            }
        }

        pending = waiting;
        if pending.is_empty() || r >= span {
            break;
        }
        r = (r * 2).min(span);
    }
    out
}

/// Windowed sum over `(2r + 1)^2` neighbourhoods, truncated at the borders.
fn box_sum(data: &[f32], w: usize, h: usize, r: usize) -> Vec<f32> {
    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        let row = &data[y * w..(y + 1) * w];
        let mut acc = 0f64;
        for &v in row.iter().take(r.min(w)) {
            acc += v as f64;
        }
        for x in 0..w {
            if x + r < w {
                acc += row[x + r] as f64;
            }
            if x > r {
                acc -= row[x - r - 1] as f64;
            }
            horizontal[y * w + x] = acc as f32;
        }
    }

    let mut out = vec![0f32; w * h];
    for x in 0..w {
        let mut acc = 0f64;
        for y in 0..r.min(h) {
            acc += horizontal[y * w + x] as f64;
        }
        for y in 0..h {
            if y + r < h {
                acc += horizontal[(y + r) * w + x] as f64;
            }
            if y > r {
                acc -= horizontal[(y - r - 1) * w + x] as f64;
            }
            out[y * w + x] = acc as f32;
        }
    }
    out
}
