// MRC: floating-point separable filters used by the threshold engine

/// Kernel radius is `truncate * sigma`, rounded.
const GAUSSIAN_TRUNCATE: f32 = 4.0;

/// Gaussian-smooth a single-channel `f32` image with half-sample symmetric
/// ("reflect") borders.
///
/// The result stays in floating point so it can be used directly as a
/// per-pixel threshold surface. A non-positive `sigma` returns the input.
pub fn gaussian_reflect(data: &[f32], width: u32, height: u32, sigma: f32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    if sigma <= 0.0 || w == 0 || h == 0 {
        return data.to_vec();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let mut tmp = vec![0f32; w * h];
    for y in 0..h {
        let row = &data[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = reflect(x as isize + k as isize - radius, w as isize);
                acc += weight * row[sx];
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, h as isize);
                acc += weight * tmp[sy * w + x];
            }
            out[y * w + x] = acc;
        }
    }
    out
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

fn reflect(i: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m >= n { period - 1 - m } else { m }) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalized() {
        let k = gaussian_kernel((9.0 - 1.0) / 6.0);
        assert_eq!(k.len(), 11);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_flat_image_stays_flat() {
        let data = vec![100.0; 20 * 10];
        let out = gaussian_reflect(&data, 20, 10, 2.0);
        assert!(out.iter().all(|&v| (v - 100.0).abs() < 1e-3));
    }

    #[test]
    fn test_step_edge_is_smoothed() {
        let data: Vec<f32> = (0..16 * 4)
            .map(|i| if i % 16 < 8 { 0.0 } else { 255.0 })
            .collect();
        let out = gaussian_reflect(&data, 16, 4, 1.5);
        let left_of_edge = out[7];
        let right_of_edge = out[8];
        assert!(left_of_edge > 0.0 && left_of_edge < 127.5);
        assert!(right_of_edge > 127.5 && right_of_edge < 255.0);
    }
}
