//! Per-pixel color filters. None of them change the canvas size, and on
//! indexed buffers they rewrite the palette only.

use super::ImageFilter;
use crate::config::RenderSettings;
use crate::imaging::buffer::PixelBuffer;
use crate::imaging::color::Color;
use crate::imaging::error::Result;
use serde::{Deserialize, Serialize};

/// ITU-R BT.709 luminosity coefficients.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Luminance-weighted desaturation, alpha preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grayscale;

impl ImageFilter for Grayscale {
    fn apply(&self, buffer: &PixelBuffer, _settings: &RenderSettings) -> Result<PixelBuffer> {
        Ok(buffer.map_colors(|c| {
            let gray = (LUMA_R * c.r as f32 + LUMA_G * c.g as f32 + LUMA_B * c.b as f32)
                .round()
                .min(255.0) as u8;
            Color::rgba(gray, gray, gray, c.a)
        }))
    }
}

/// `out = clamp(gain * in + bias * 255)` on each color channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Contrast {
    pub gain: f32,
    pub bias: f32,
}

impl Default for Contrast {
    fn default() -> Self {
        Self {
            gain: 1.0,
            bias: 0.0,
        }
    }
}

impl Contrast {
    pub fn new(gain: f32, bias: f32) -> Self {
        Self { gain, bias }
    }

    fn table(&self) -> [u8; 256] {
        std::array::from_fn(|v| {
            (self.gain * v as f32 + self.bias * 255.0)
                .round()
                .clamp(0.0, 255.0) as u8
        })
    }
}

impl ImageFilter for Contrast {
    fn apply(&self, buffer: &PixelBuffer, _settings: &RenderSettings) -> Result<PixelBuffer> {
        let t = self.table();
        Ok(buffer.map_colors(|c| {
            Color::rgba(t[c.r as usize], t[c.g as usize], t[c.b as usize], c.a)
        }))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.gain.is_finite() || !self.bias.is_finite() {
            return Err(format!(
                "contrast gain and bias must be finite, got {} / {}",
                self.gain, self.bias
            ));
        }
        Ok(())
    }
}

/// Two or more color stops, spread evenly over the 0-255 input range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Color>", into = "Vec<Color>")]
pub struct Colormap {
    stops: Vec<Color>,
}

impl Colormap {
    pub fn new(stops: Vec<Color>) -> std::result::Result<Self, String> {
        if stops.len() < 2 {
            return Err(format!(
                "a colormap needs at least 2 stops, got {}",
                stops.len()
            ));
        }
        Ok(Self { stops })
    }

    /// Black to warm brown, the classic sepia tint.
    pub fn sepia() -> Self {
        Self {
            stops: vec![Color::rgb(0, 0, 0), Color::rgb(255, 240, 192)],
        }
    }

    pub fn stops(&self) -> &[Color] {
        &self.stops
    }

    /// The 256-entry ramp of one channel.
    fn ramp(&self, channel: impl Fn(Color) -> u8) -> [u8; 256] {
        let segments = (self.stops.len() - 1) as f32;
        std::array::from_fn(|v| {
            let pos = v as f32 / 255.0 * segments;
            let i = (pos.floor() as usize).min(self.stops.len() - 2);
            let t = pos - i as f32;
            let a = channel(self.stops[i]) as f32;
            let b = channel(self.stops[i + 1]) as f32;
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        })
    }
}

impl TryFrom<Vec<Color>> for Colormap {
    type Error = String;

    fn try_from(stops: Vec<Color>) -> std::result::Result<Self, Self::Error> {
        Self::new(stops)
    }
}

impl From<Colormap> for Vec<Color> {
    fn from(map: Colormap) -> Self {
        map.stops
    }
}

/// Remap every channel through the colormap's ramp for that channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lookup {
    pub colormap: Colormap,
}

impl ImageFilter for Lookup {
    fn apply(&self, buffer: &PixelBuffer, _settings: &RenderSettings) -> Result<PixelBuffer> {
        let r = self.colormap.ramp(|c| c.r);
        let g = self.colormap.ramp(|c| c.g);
        let b = self.colormap.ramp(|c| c.b);
        Ok(buffer.map_colors(|c| {
            Color::rgba(r[c.r as usize], g[c.g as usize], b[c.b as usize], c.a)
        }))
    }
}
