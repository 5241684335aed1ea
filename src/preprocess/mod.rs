//! Canvas normalization for glyph images
//!
//! Every source image is resampled onto a fixed-size grayscale canvas before
//! feature extraction: uniform scale preserving aspect ratio, bicubic
//! resampling, centered placement over a solid background (letterboxing).

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::core::{ClassifierError, Result};

/// Target canvas: dimensions plus the background fill for letterbox bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    /// Grayscale fill value, 0 = black, 255 = white.
    pub background: u8,
}

impl CanvasSpec {
    pub fn new(width: u32, height: u32, background: u8) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ClassifierError::Configuration(format!(
                "canvas dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            background,
        })
    }

    /// Tiny 6x12 canvas for coarse raw-pixel features.
    pub fn coarse() -> Self {
        Self {
            width: 6,
            height: 12,
            background: 255,
        }
    }

    /// 30x30 black-filled canvas for visually-centered glyphs.
    pub fn glyph() -> Self {
        Self {
            width: 30,
            height: 30,
            background: 0,
        }
    }

    /// Samples on the canvas (single grayscale channel).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::glyph()
    }
}

/// Normalize a source image onto the target canvas.
///
/// The scale factor `min(tw/sw, th/sh)` is applied uniformly, so the source
/// is never cropped and never distorted; small sources are scaled up. The
/// result is deterministic for identical inputs and spec.
pub fn normalize(image: &DynamicImage, spec: &CanvasSpec) -> GrayImage {
    let gray = image.to_luma8();
    let (src_w, src_h) = gray.dimensions();

    let scale = f64::min(
        spec.width as f64 / src_w as f64,
        spec.height as f64 / src_h as f64,
    );
    let scaled_w = ((src_w as f64 * scale).round() as u32)
        .clamp(1, spec.width);
    let scaled_h = ((src_h as f64 * scale).round() as u32)
        .clamp(1, spec.height);

    let resized = imageops::resize(&gray, scaled_w, scaled_h, FilterType::CatmullRom);

    let mut canvas = GrayImage::from_pixel(spec.width, spec.height, Luma([spec.background]));
    let offset_x = (spec.width - scaled_w) / 2;
    let offset_y = (spec.height - scaled_h) / 2;
    imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);
    canvas
}
