// OCR layout: paragraphs -> lines -> words with pixel bounding boxes

use std::path::Path;

use serde::Deserialize;

use crate::error::{MrcError, Result};

/// Pixel bounding box in OCR-reference coordinates, `[left, top, right, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[i64; 4]")]
pub struct BBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl From<[i64; 4]> for BBox {
    fn from([left, top, right, bottom]: [i64; 4]) -> Self {
        BBox {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl BBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        BBox {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Map coordinates onto an image reduced by `factor`, truncating toward zero.
    pub fn scaled_down(&self, factor: u32) -> BBox {
        let f = factor as f64;
        BBox {
            left: (self.left as f64 / f) as i64,
            top: (self.top as f64 / f) as i64,
            right: (self.right as f64 / f) as i64,
            bottom: (self.bottom as f64 / f) as i64,
        }
    }

    /// Zero width or zero height.
    pub fn is_collapsed(&self) -> bool {
        self.left == self.right || self.top == self.bottom
    }

    /// `left < right` and `top < bottom`.
    pub fn is_well_formed(&self) -> bool {
        self.left < self.right && self.top < self.bottom
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0 && self.top >= 0 && self.right <= width as i64 && self.bottom <= height as i64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrLine {
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrParagraph {
    #[serde(default)]
    pub lines: Vec<OcrLine>,
}

/// OCR words of one page, grouped as the OCR engine reported them.
pub type PageLayout = Vec<OcrParagraph>;

/// Iterate over every word of a page in reading order.
pub fn page_words(layout: &[OcrParagraph]) -> impl Iterator<Item = &OcrWord> {
    layout
        .iter()
        .flat_map(|p| p.lines.iter())
        .flat_map(|l| l.words.iter())
}

/// Whole-document OCR layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrLayout {
    pub pages: Vec<PageLayout>,
}

impl OcrLayout {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MrcError::layout(format!("Failed to parse OCR layout JSON: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MrcError::layout(format!("Failed to read OCR layout {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
