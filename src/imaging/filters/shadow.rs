//! Drop shadow: a blurred, offset, colored silhouette of the image's alpha
//! drawn behind it.
//!
//! The canvas grows by `2 * blur_radius` plus the absolute offset on each
//! axis: blur margin on both edges, offset on the side it points to.

use super::ImageFilter;
use super::blur::blur_mask;
use crate::config::RenderSettings;
use crate::imaging::buffer::PixelBuffer;
use crate::imaging::color::Color;
use crate::imaging::error::{ImagingError, MAX_CANVAS_AREA, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted offset or blur radius, in pixels.
const MAX_SHADOW_MARGIN: u32 = 4096;

fn default_opacity() -> u8 {
    180
}

fn default_color() -> Color {
    Color::BLACK
}

fn default_blur_radius() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shadow {
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
    /// Shadow alpha at full coverage (0-255).
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default = "default_color")]
    pub color: Color,
    /// Canvas color under the shadow; the settings fill when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default = "default_blur_radius")]
    pub blur_radius: u32,
}

impl Shadow {
    pub fn new(x_offset: i32, y_offset: i32) -> Self {
        Self {
            x_offset,
            y_offset,
            opacity: default_opacity(),
            color: default_color(),
            background: None,
            blur_radius: default_blur_radius(),
        }
    }

    /// Extra canvas per axis, saturating at `u32::MAX`.
    fn growth(&self) -> (u32, u32) {
        let blur = self.blur_radius.saturating_mul(2);
        (
            self.x_offset.unsigned_abs().saturating_add(blur),
            self.y_offset.unsigned_abs().saturating_add(blur),
        )
    }

    /// Grown canvas for a `width` x `height` input, without overflow.
    fn canvas(&self, width: u32, height: u32) -> (u64, u64) {
        let blur = 2 * self.blur_radius as u64;
        (
            width as u64 + self.x_offset.unsigned_abs() as u64 + blur,
            height as u64 + self.y_offset.unsigned_abs() as u64 + blur,
        )
    }

    /// Where the original image sits on the grown canvas.
    fn image_origin(&self) -> (i64, i64) {
        let r = self.blur_radius as i64;
        (
            r + (-(self.x_offset as i64)).max(0),
            r + (-(self.y_offset as i64)).max(0),
        )
    }
}

impl ImageFilter for Shadow {
    fn apply(&self, buffer: &PixelBuffer, settings: &RenderSettings) -> Result<PixelBuffer> {
        let (canvas_w, canvas_h) = self.canvas(buffer.width(), buffer.height());
        let area = canvas_w.saturating_mul(canvas_h);
        let limit = if self.blur_radius > 0 {
            settings.maximum_blur_size.min(MAX_CANVAS_AREA)
        } else {
            MAX_CANVAS_AREA
        };
        if area > limit {
            return Err(ImagingError::ResourceLimitExceeded { area, limit });
        }
        // Both sides fit in u32: their product is at most 2^28
        let (width, height) = (canvas_w as u32, canvas_h as u32);

        let (ix, iy) = self.image_origin();
        let (sx, sy) = (ix + self.x_offset as i64, iy + self.y_offset as i64);

        let mut mask = vec![0u8; width as usize * height as usize];
        let opacity = self.opacity as u32;
        for y in 0..buffer.height() {
            let row = (sy as usize + y as usize) * width as usize;
            for x in 0..buffer.width() {
                let a = buffer.get(x, y).a as u32;
                mask[row + sx as usize + x as usize] = ((a * opacity + 127) / 255) as u8;
            }
        }
        let mask = blur_mask(&mask, width, height, self.blur_radius);

        let [r, g, b] = self.color.to_rgb();
        let silhouette = PixelBuffer::rgba(
            width,
            height,
            mask.into_iter().map(|a| [r, g, b, a]).collect(),
        )?;

        let background = self.background.unwrap_or(settings.fill.color());
        let mut canvas = PixelBuffer::filled(width, height, background)?;
        canvas.composite_over(&silhouette, 0, 0);
        canvas.composite_over(buffer, ix, iy);
        Ok(canvas)
    }

    fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (gx, gy) = self.growth();
        (width.saturating_add(gx), height.saturating_add(gy))
    }

    fn input_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (gx, gy) = self.growth();
        (
            width.saturating_sub(gx).max(1),
            height.saturating_sub(gy).max(1),
        )
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.blur_radius > MAX_SHADOW_MARGIN {
            return Err(format!(
                "blur_radius must be at most {MAX_SHADOW_MARGIN}, got {}",
                self.blur_radius
            ));
        }
        for (name, offset) in [("x_offset", self.x_offset), ("y_offset", self.y_offset)] {
            if offset.unsigned_abs() > MAX_SHADOW_MARGIN {
                return Err(format!(
                    "{name} must be within +/-{MAX_SHADOW_MARGIN}, got {offset}"
                ));
            }
        }
        Ok(())
    }
}
