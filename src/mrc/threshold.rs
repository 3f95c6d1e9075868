// MRC: threshold engine (local-adaptive, Otsu, Sauvola page pass)

use image::GrayImage;
use imageproc::contrast::otsu_level;

use super::filter::gaussian_reflect;
use super::mask::Mask;
use super::noise::estimate_sigma;
use crate::error::Result;

/// Block size of the gaussian local threshold applied to OCR word crops.
pub const WORD_BLOCK_SIZE: u32 = 9;

/// Window of the whole-page Sauvola pass.
pub const PAGE_WINDOW: u32 = 51;

const SAUVOLA_K: f64 = 0.3;
const SAUVOLA_R: f64 = 128.0;

/// Output of thresholding one region, with the statistics the word
/// disambiguation needs.
#[derive(Debug, Clone)]
pub struct ThresholdResult {
    pub mask: Mask,
    /// Wavelet noise estimate of the binary mask.
    pub noise: f32,
    pub set_count: usize,
}

impl ThresholdResult {
    /// Run [`hocr_threshold`] on `crop` and collect its statistics.
    pub fn evaluate(crop: &GrayImage) -> Result<Self> {
        let mask = hocr_threshold(crop)?;
        let noise = estimate_sigma(&mask.to_f32(), mask.width(), mask.height());
        let set_count = mask.count_set();
        Ok(Self {
            mask,
            noise,
            set_count,
        })
    }
}

/// Gaussian-weighted local mean threshold.
///
/// The threshold surface is the image smoothed with
/// `sigma = (block_size - 1) / 6`. A pixel is set when it is darker than the
/// surface, or brighter when `reversed`.
pub fn local_adaptive(image: &GrayImage, block_size: u32, reversed: bool) -> Mask {
    let (w, h) = image.dimensions();
    let data: Vec<f32> = image.as_raw().iter().map(|&v| v as f32).collect();
    let sigma = (block_size.saturating_sub(1)) as f32 / 6.0;
    let surface = gaussian_reflect(&data, w, h, sigma);

    let bits = data
        .iter()
        .zip(&surface)
        .map(|(&v, &t)| if reversed { v > t } else { v < t })
        .collect();
    Mask::from_vec(w, h, bits)
}

/// Global Otsu threshold.
///
/// Pixels in the dark class (`v <= level`) are set, or the bright class when
/// `reversed`. Otsu is undefined for a uniform image; that case yields an
/// all-false mask rather than an error.
pub fn global_otsu(image: &GrayImage, reversed: bool) -> Mask {
    let (w, h) = image.dimensions();
    let raw = image.as_raw();
    let uniform = match raw.first() {
        Some(&first) => raw.iter().all(|&v| v == first),
        None => true,
    };
    if uniform {
        return Mask::new(w, h);
    }

    let level = otsu_level(image);
    let bits = raw
        .iter()
        .map(|&v| if reversed { v > level } else { v <= level })
        .collect();
    Mask::from_vec(w, h, bits)
}

/// Word-crop threshold: local-adaptive AND global Otsu, both in normal
/// orientation. Intersection, never union.
pub fn hocr_threshold(crop: &GrayImage) -> Result<Mask> {
    let local = local_adaptive(crop, WORD_BLOCK_SIZE, false);
    let otsu = global_otsu(crop, false);
    Mask::intersection(&local, &otsu)
}

/// Whole-page Sauvola threshold over a fixed 51x51 window.
///
/// Sauvola classifies pixels brighter than `T = m * (1 + k * (s / R - 1))`
/// as background; the page mask is the inversion of that, so dark pixels
/// (`v <= T`) are set.
pub fn page_threshold(image: &GrayImage) -> Mask {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Mask::new(w, h);
    }
    let (sum, sq_sum) = integral_images(image);
    let stride = w as usize + 1;
    let half = (PAGE_WINDOW / 2) as usize;

    let mut bits = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h as usize {
        let y1 = y.saturating_sub(half);
        let y2 = (y + half + 1).min(h as usize);
        for x in 0..w as usize {
            let x1 = x.saturating_sub(half);
            let x2 = (x + half + 1).min(w as usize);
            let area = ((x2 - x1) * (y2 - y1)) as f64;

            let s = window_sum(&sum, stride, x1, y1, x2, y2) as f64;
            let sq = window_sum(&sq_sum, stride, x1, y1, x2, y2) as f64;
            let mean = s / area;
            let std = (sq / area - mean * mean).max(0.0).sqrt();
            let threshold = mean * (1.0 + SAUVOLA_K * (std / SAUVOLA_R - 1.0));

            let v = image.as_raw()[y * w as usize + x] as f64;
            bits.push(v <= threshold);
        }
    }
    Mask::from_vec(w, h, bits)
}

/// Summed-area tables of pixel values and squared pixel values.
fn integral_images(gray: &GrayImage) -> (Vec<u64>, Vec<u64>) {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut sum = vec![0u64; stride * (h + 1) as usize];
    let mut sq = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        let mut row_sq: u64 = 0;
        for x in 0..w {
            let v = gray.get_pixel(x, y).0[0] as u64;
            row_sum += v;
            row_sq += v * v;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            sum[idx] = row_sum + sum[above];
            sq[idx] = row_sq + sq[above];
        }
    }
    (sum, sq)
}

fn window_sum(table: &[u64], stride: usize, x1: usize, y1: usize, x2: usize, y2: usize) -> u64 {
    table[y2 * stride + x2] + table[y1 * stride + x1]
        - table[y1 * stride + x2]
        - table[y2 * stride + x1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
    }

    #[test]
    fn test_otsu_uniform_is_all_false() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        assert_eq!(global_otsu(&img, false).count_set(), 0);
        assert_eq!(global_otsu(&img, true).count_set(), 0);
    }

    #[test]
    fn test_otsu_orientations_partition_pixels() {
        let img = gradient(20, 20);
        let normal = global_otsu(&img, false);
        let reversed = global_otsu(&img, true);
        assert_eq!(normal.inverted(), reversed);
    }

    #[test]
    fn test_otsu_two_level_image() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 3 { 10 } else { 240 }]));
        let mask = global_otsu(&img, false);
        assert_eq!(mask.count_set(), 30);
        assert!(mask.get(0, 0));
        assert!(!mask.get(9, 9));
    }

    #[test]
    fn test_local_adaptive_marks_dark_side_of_edge() {
        let img = GrayImage::from_fn(20, 5, |x, _| Luma([if x < 10 { 20 } else { 230 }]));
        let normal = local_adaptive(&img, WORD_BLOCK_SIZE, false);
        let reversed = local_adaptive(&img, WORD_BLOCK_SIZE, true);
        assert!(normal.get(9, 2));
        assert!(!normal.get(10, 2));
        assert!(reversed.get(10, 2));
    }

    #[test]
    fn test_hocr_threshold_is_intersection() {
        let img = gradient(24, 18);
        let expected = Mask::intersection(
            &local_adaptive(&img, WORD_BLOCK_SIZE, false),
            &global_otsu(&img, false),
        )
        .unwrap();
        assert_eq!(hocr_threshold(&img).unwrap(), expected);
    }

    #[test]
    fn test_page_threshold_white_page_is_empty() {
        let img = GrayImage::from_pixel(60, 60, Luma([255]));
        assert_eq!(page_threshold(&img).count_set(), 0);
    }

    #[test]
    fn test_page_threshold_marks_dark_block() {
        let img = GrayImage::from_fn(80, 80, |x, y| {
            Luma([if (30..50).contains(&x) && (30..50).contains(&y) { 0 } else { 255 }])
        });
        let mask = page_threshold(&img);
        assert_eq!(mask.count_set(), 400);
        assert!(mask.get(40, 40));
        assert!(!mask.get(5, 5));
    }

    #[test]
    fn test_evaluate_reports_counts() {
        let img = GrayImage::from_pixel(12, 12, Luma([200]));
        let result = ThresholdResult::evaluate(&img).unwrap();
        assert_eq!(result.set_count, 0);
        assert_eq!(result.noise, 0.0);
    }
}
