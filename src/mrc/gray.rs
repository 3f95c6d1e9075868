// Grayscale output mode: per-channel levels, then HSL lightness

use std::time::Instant;

use image::{DynamicImage, GrayImage, Luma, RgbImage};

use super::{Page, PageImage};
use crate::telemetry::context::{PageContext, Stage};

/// Mean, min, max and population standard deviation of one channel, scaled
/// to `0.0..=1.0`.
#[derive(Debug, Clone, Copy)]
struct ChannelStats {
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
}

impl ChannelStats {
    fn of(image: &RgbImage, channel: usize) -> Self {
        let n = (image.width() as f64 * image.height() as f64).max(1.0);
        let (mut min, mut max) = (u8::MAX, u8::MIN);
        let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
        for pixel in image.pixels() {
            let v = pixel[channel];
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
        }
        let mean = sum / n;
        let var = (sum_sq / n - mean * mean).max(0.0);
        ChannelStats {
            min: min as f64 / 255.0,
            max: max as f64 / 255.0,
            mean: mean / 255.0,
            std: var.sqrt() / 255.0,
        }
    }
}

/// Black and white points of each channel, in 0-255 units.
fn channel_levels(image: &RgbImage) -> [(f64, f64); 3] {
    let [r, g, b] = [0, 1, 2].map(|c| ChannelStats::of(image, c));

    let ratio = r.mean * g.mean * b.mean / (b.max * (1.0 - r.std) * (1.0 - g.std) * (1.0 - b.std));
    let bright_adjust = if ratio.is_finite() {
        (ratio * 10_000.0).round() / 10_000.0
    } else {
        0.0
    };

    let low = ((196.0 * r.min + 14.5) as i64).min(50);
    let high = [(35.66, 48.5), (39.22, 44.5), (45.16, 36.5)]
        .map(|(slope, offset)| ((slope * bright_adjust + offset) as i64).min(95));

    let percent = |p: i64| p as f64 * 255.0 / 100.0;
    high.map(|h| (percent(low), percent(h)))
}

/// Stretch `value` so `min..=max` covers the full 0-255 range.
fn level(value: u8, min: f64, max: f64) -> f64 {
    let v = value as f64;
    if v > max {
        255.0
    } else if v < min {
        0.0
    } else {
        (v - min) / ((max - min) / 255.0)
    }
}

/// Convert a colour page to gray by levelling each channel from its own
/// statistics and keeping the HSL lightness `(max + min) / 2`.
pub fn special_gray_convert(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    let levels = channel_levels(&rgb);
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let pixel = rgb.get_pixel(x, y);
        let mut hi = 0u8;
        let mut lo = u8::MAX;
        for (c, &(min, max)) in levels.iter().enumerate() {
            let v = level(pixel[c], min, max).clamp(0.0, 255.0) as u8;
            hi = hi.max(v);
            lo = lo.min(v);
        }
        let lightness = (hi as f64 + lo as f64) / 2.0 / 255.0;
        Luma([(lightness * 255.0) as u8])
    })
}

/// Replace a colour page by its grayscale rendition. Bilevel and gray pages
/// pass through untouched.
pub fn convert_page(page: Page, ctx: &mut PageContext) -> Page {
    let Page {
        index,
        image,
        layout,
    } = page;
    let image = match image {
        PageImage::Raster(source) if !matches!(source, DynamicImage::ImageLuma8(_)) => {
            let started = Instant::now();
            let gray = special_gray_convert(&source);
            ctx.record(Stage::SpecialGrayConvert, started.elapsed());
            PageImage::Raster(DynamicImage::ImageLuma8(gray))
        }
        other => other,
    };
    Page {
        index,
        image,
        layout,
    }
}
