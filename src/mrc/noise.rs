// MRC: wavelet-based noise estimation

/// Daubechies-2 decomposition high-pass filter.
const DB2_DEC_HI: [f32; 4] = [
    -0.482_962_9,
    0.836_516_3,
    -0.224_143_87,
    -0.129_409_52,
];

/// 75th percentile of the standard normal distribution.
const NORM_PPF_075: f32 = 0.674_489_75;

/// Estimate the Gaussian noise standard deviation of a single-channel image.
///
/// Uses the robust wavelet estimator: the median absolute value of the
/// finest diagonal (HH) detail coefficients of a one-level db2 transform,
/// divided by the 75th normal quantile. Coefficients that are exactly zero
/// are ignored, so a perfectly flat image (or an empty mask) yields `0.0`.
pub fn estimate_sigma(data: &[f32], width: u32, height: u32) -> f32 {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 || data.len() != w * h {
        return 0.0;
    }

    // Rows first, then columns of the row-filtered band.
    let out_w = dwt_len(w);
    let out_h = dwt_len(h);
    let mut rows = vec![0f32; h * out_w];
    let mut line = vec![0f32; w.max(h)];
    for y in 0..h {
        line[..w].copy_from_slice(&data[y * w..(y + 1) * w]);
        for k in 0..out_w {
            rows[y * out_w + k] = high_pass(&line[..w], k);
        }
    }

    let mut coeffs = Vec::with_capacity(out_w * out_h);
    for x in 0..out_w {
        for y in 0..h {
            line[y] = rows[y * out_w + x];
        }
        for k in 0..out_h {
            let c = high_pass(&line[..h], k).abs();
            if c != 0.0 {
                coeffs.push(c);
            }
        }
    }

    match median(&mut coeffs) {
        Some(m) => m / NORM_PPF_075,
        None => 0.0,
    }
}

/// Noise estimate of a grayscale image.
pub fn estimate_sigma_gray(image: &image::GrayImage) -> f32 {
    let data: Vec<f32> = image.as_raw().iter().map(|&v| v as f32).collect();
    estimate_sigma(&data, image.width(), image.height())
}

fn dwt_len(n: usize) -> usize {
    (n + DB2_DEC_HI.len() - 1) / 2
}

fn high_pass(signal: &[f32], k: usize) -> f32 {
    let n = signal.len() as isize;
    DB2_DEC_HI
        .iter()
        .enumerate()
        .map(|(j, &tap)| tap * signal[symmetric_index(2 * k as isize + 1 - j as isize, n)])
        .sum()
}

/// Half-sample symmetric extension: `... b a | a b c | c b ...`.
fn symmetric_index(i: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m >= n { period - 1 - m } else { m }) as usize
}

fn median(values: &mut [f32]) -> Option<f32> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some((values[n / 2 - 1] + values[n / 2]) * 0.5)
    }
}
