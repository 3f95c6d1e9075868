// Run-scoped warning set and timing ledger

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Recoverable conditions recorded during a run. None of them abort a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Warning {
    /// An OCR word box with `left >= right` or `top >= bottom`.
    InvalidBoundingBox,
    /// An OCR word box that reaches outside the page image.
    BoundingBoxOutsideImage,
    /// The background layer is too small to downsample by the requested factor.
    TooSmallToDownsample,
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Warning::InvalidBoundingBox => "invalid-bounding-box",
            Warning::BoundingBoxOutsideImage => "bounding-box-outside-image",
            Warning::TooSmallToDownsample => "too-small-to-downsample",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Append-only set of warning codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSet {
    codes: BTreeSet<Warning>,
}

impl ErrorSet {
    pub fn add(&mut self, warning: Warning) {
        self.codes.insert(warning);
    }

    pub fn contains(&self, warning: Warning) -> bool {
        self.codes.contains(&warning)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Warning> + '_ {
        self.codes.iter().copied()
    }

    pub fn extend(&mut self, other: &ErrorSet) {
        self.codes.extend(other.codes.iter().copied());
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.codes.iter().map(Warning::code).collect()
    }
}

/// Pipeline sub-stages that are timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ImageLoad,
    SpecialGrayConvert,
    GreyConversion,
    HocrMaskGen,
    NoiseEstimate,
    PreBlur,
    Threshold,
    MaskNoiseEstimate,
    Denoise,
    ForegroundFill,
    BackgroundFill,
    BackgroundDownsample,
    MaskEncode,
    ForegroundEncode,
    BackgroundEncode,
    PageImageInsertion,
}

impl Stage {
    /// Key used in telemetry payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ImageLoad => "image_load",
            Stage::SpecialGrayConvert => "special_gray_convert",
            Stage::GreyConversion => "grey_conversion",
            Stage::HocrMaskGen => "hocr_mask_gen",
            Stage::NoiseEstimate => "est_1",
            Stage::PreBlur => "blur_1",
            Stage::Threshold => "threshold",
            Stage::MaskNoiseEstimate => "est_3",
            Stage::Denoise => "denoise",
            Stage::ForegroundFill => "fg_partial_blur",
            Stage::BackgroundFill => "bg_partial_blur",
            Stage::BackgroundDownsample => "bg_downsample",
            Stage::MaskEncode => "mask_jbig2",
            Stage::ForegroundEncode => "fg_jp2",
            Stage::BackgroundEncode => "bg_jp2",
            Stage::PageImageInsertion => "page_image_insertion",
        }
    }
}

/// Ordered, append-only sequence of stage timings with a flush cursor.
#[derive(Debug, Clone, Default)]
pub struct TimingLedger {
    entries: Vec<(Stage, Duration)>,
    flushed: usize,
}

impl TimingLedger {
    pub fn push(&mut self, stage: Stage, duration: Duration) {
        self.entries.push((stage, duration));
    }

    pub fn entries(&self) -> &[(Stage, Duration)] {
        &self.entries
    }

    /// Summarize everything since the last flush and advance the cursor.
    pub fn flush(&mut self, pages: usize) -> BTreeMap<String, u64> {
        let summary = summarize(&self.entries[self.flushed..], pages);
        self.flushed = self.entries.len();
        summary
    }

    /// Summary over the whole run, without moving the cursor.
    pub fn summary(&self, pages: usize) -> BTreeMap<String, u64> {
        summarize(&self.entries, pages)
    }
}

/// Per-stage total divided by page count, in whole milliseconds.
pub fn summarize(entries: &[(Stage, Duration)], pages: usize) -> BTreeMap<String, u64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for (stage, duration) in entries {
        *sums.entry(stage.name().to_string()).or_insert(0.0) += duration.as_secs_f64();
    }
    let pages = pages.max(1) as f64;
    sums.into_iter()
        .map(|(k, v)| (k, ((v / pages) * 1000.0).round() as u64))
        .collect()
}

/// Warnings and timings of a single page. Owned exclusively by the page's
/// pipeline and merged into the [`RunContext`] afterwards.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub warnings: ErrorSet,
    pub timings: Vec<(Stage, Duration)>,
}

impl PageContext {
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.add(warning);
    }

    pub fn record(&mut self, stage: Stage, duration: Duration) {
        self.timings.push((stage, duration));
    }
}

/// Run-scoped accumulator threaded through the document loop.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub errors: ErrorSet,
    pub timings: TimingLedger,
}

impl RunContext {
    pub fn absorb(&mut self, page: PageContext) {
        self.errors.extend(&page.warnings);
        for (stage, duration) in page.timings {
            self.timings.push(stage, duration);
        }
    }
}
