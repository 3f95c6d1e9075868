// MRC: boolean text mask (true = kept/text pixel)

use image::{GrayImage, Luma};

use crate::error::{MrcError, Result};

/// A boolean pixel mask in row-major order.
///
/// Word-level thresholds are combined with [`Mask::intersection`]; the
/// page-level pass is merged with [`Mask::union_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    /// Create an all-false mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub(crate) fn from_vec(width: u32, height: u32, bits: Vec<bool>) -> Self {
        debug_assert_eq!(bits.len(), width as usize * height as usize);
        Self {
            width,
            height,
            bits,
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    /// Interpret a bilevel image: dark pixels (< 128) are ink and become `true`.
    pub fn from_bilevel_image(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y).0[0] < 128
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.index(x, y);
        self.bits[idx] = value;
    }

    /// Number of set pixels.
    pub fn count_set(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Pixel-wise AND of two equally sized masks.
    pub fn intersection(a: &Mask, b: &Mask) -> Result<Mask> {
        a.check_same_size(b)?;
        let bits = a.bits.iter().zip(&b.bits).map(|(&p, &q)| p && q).collect();
        Ok(Mask {
            width: a.width,
            height: a.height,
            bits,
        })
    }

    /// Pixel-wise OR of two equally sized masks.
    pub fn union(a: &Mask, b: &Mask) -> Result<Mask> {
        let mut out = a.clone();
        out.union_with(b)?;
        Ok(out)
    }

    /// In-place OR: sets every pixel that is set in `other`. Never clears a bit.
    pub fn union_with(&mut self, other: &Mask) -> Result<()> {
        self.check_same_size(other)?;
        for (dst, &src) in self.bits.iter_mut().zip(&other.bits) {
            *dst |= src;
        }
        Ok(())
    }

    /// Logical NOT of every pixel.
    pub fn inverted(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            bits: self.bits.iter().map(|&b| !b).collect(),
        }
    }

    /// Overwrite the region starting at (`left`, `top`) with `patch`.
    pub fn paste(&mut self, patch: &Mask, left: u32, top: u32) -> Result<()> {
        if left as u64 + patch.width as u64 > self.width as u64
            || top as u64 + patch.height as u64 > self.height as u64
        {
            return Err(MrcError::threshold(format!(
                "patch {}x{} at ({}, {}) exceeds mask {}x{}",
                patch.width, patch.height, left, top, self.width, self.height
            )));
        }
        for y in 0..patch.height {
            let src = (y as usize) * patch.width as usize;
            let dst = self.index(left, top + y);
            self.bits[dst..dst + patch.width as usize]
                .copy_from_slice(&patch.bits[src..src + patch.width as usize]);
        }
        Ok(())
    }

    /// Nearest-neighbour resize, used for bilevel pages that get downsampled.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            let sx = ((x as u64 * self.width as u64) / width.max(1) as u64) as u32;
            let sy = ((y as u64 * self.height as u64) / height.max(1) as u64) as u32;
            self.get(sx.min(self.width - 1), sy.min(self.height - 1))
        })
    }

    /// The mask as 0.0 / 1.0 floats, for noise estimation and denoising.
    pub fn to_f32(&self) -> Vec<f32> {
        self.bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()
    }

    /// Render as an 8-bit bitmap: set pixels are black ink on white.
    pub fn to_bitmap(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = Luma([if self.bits[i] { 0 } else { 255 }]);
        }
        img
    }

    fn check_same_size(&self, other: &Mask) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(MrcError::threshold(format!(
                "mask dimensions differ: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes() -> Mask {
        Mask::from_fn(4, 2, |x, _| x % 2 == 0)
    }

    #[test]
    fn test_intersection_and_union_are_distinct() {
        let a = stripes();
        let b = Mask::from_fn(4, 2, |_, y| y == 0);

        let and = Mask::intersection(&a, &b).unwrap();
        let or = Mask::union(&a, &b).unwrap();

        assert_eq!(and.count_set(), 2);
        assert_eq!(or.count_set(), 6);
    }

    #[test]
    fn test_union_with_never_clears() {
        let mut a = stripes();
        let before = a.clone();
        a.union_with(&Mask::new(4, 2)).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let a = Mask::new(3, 3);
        let b = Mask::new(3, 4);
        assert!(Mask::intersection(&a, &b).is_err());
    }

    #[test]
    fn test_paste_overwrites_region() {
        let mut page = Mask::from_fn(5, 5, |_, _| true);
        page.paste(&Mask::new(2, 2), 1, 1).unwrap();
        assert!(!page.get(1, 1));
        assert!(!page.get(2, 2));
        assert!(page.get(3, 3));
        assert_eq!(page.count_set(), 21);
    }

    #[test]
    fn test_paste_out_of_bounds_rejected() {
        let mut page = Mask::new(5, 5);
        assert!(page.paste(&Mask::new(2, 2), 4, 0).is_err());
    }

    #[test]
    fn test_bitmap_uses_black_ink() {
        let bitmap = stripes().to_bitmap();
        assert_eq!(bitmap.get_pixel(0, 0).0[0], 0);
        assert_eq!(bitmap.get_pixel(1, 0).0[0], 255);
        assert_eq!(Mask::from_bilevel_image(&bitmap), stripes());
    }
}
