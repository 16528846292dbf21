//! Small value types describing *how* an operation should run.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1-100). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold) applied after downscaling.
//! - [`QualityProfile`]: Speed/quality trade-off selecting interpolation kernel and sharpening.
//! - [`Interpolation`]: The resampling kernel a profile resolves to.
//! - [`Anchor`]: One of nine reference positions for crop windows and letterboxing.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Map a `[0.0, 1.0]` compression quality onto the 1-100 scale.
    ///
    /// 0.0 still yields a decodable (if blocky) JPEG at quality 1.
    pub fn from_fraction(fraction: f32) -> Self {
        let fraction = if fraction.is_finite() { fraction } else { 1.0 };
        Self::new((fraction.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening, the default after bicubic downscaling.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
    /// Catmull-Rom.
    Bicubic,
}

impl Interpolation {
    pub fn filter_type(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
        }
    }
}

/// Declared speed/quality trade-off for a rendering session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityProfile {
    Speed,
    #[default]
    Quality,
    QualityBicubic,
    QualitySoft,
}

impl QualityProfile {
    /// Kernel used for the final resampling pass and for rotation.
    pub fn interpolation(self) -> Interpolation {
        match self {
            QualityProfile::Speed => Interpolation::Nearest,
            QualityProfile::QualitySoft => Interpolation::Bilinear,
            QualityProfile::Quality | QualityProfile::QualityBicubic => Interpolation::Bicubic,
        }
    }

    /// Unsharp pass applied after downscaling, if any.
    pub fn sharpening(self) -> Option<Sharpening> {
        match self {
            QualityProfile::Speed => None,
            QualityProfile::Quality => Some(Sharpening::light()),
            QualityProfile::QualityBicubic => Some(Sharpening {
                sigma: 0.6,
                threshold: 0,
            }),
            QualityProfile::QualitySoft => Some(Sharpening {
                sigma: 0.35,
                threshold: 2,
            }),
        }
    }
}

impl FromStr for QualityProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "speed" => Ok(QualityProfile::Speed),
            "quality" => Ok(QualityProfile::Quality),
            "quality-bicubic" => Ok(QualityProfile::QualityBicubic),
            "quality-soft" => Ok(QualityProfile::QualitySoft),
            other => Err(format!("unknown quality profile: {other}")),
        }
    }
}

/// Reference position of a crop window within its source, or of a scaled
/// image within its canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    Center,
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::Center,
        Anchor::Up,
        Anchor::Down,
        Anchor::Left,
        Anchor::Right,
        Anchor::UpLeft,
        Anchor::UpRight,
        Anchor::DownLeft,
        Anchor::DownRight,
    ];

    /// Position along each axis in halves: 0 = start edge, 1 = middle, 2 = end edge.
    pub fn halves(self) -> (i64, i64) {
        match self {
            Anchor::Center => (1, 1),
            Anchor::Up => (1, 0),
            Anchor::Down => (1, 2),
            Anchor::Left => (0, 1),
            Anchor::Right => (2, 1),
            Anchor::UpLeft => (0, 0),
            Anchor::UpRight => (2, 0),
            Anchor::DownLeft => (0, 2),
            Anchor::DownRight => (2, 2),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Anchor::Center => "center",
            Anchor::Up => "up",
            Anchor::Down => "down",
            Anchor::Left => "left",
            Anchor::Right => "right",
            Anchor::UpLeft => "up_left",
            Anchor::UpRight => "up_right",
            Anchor::DownLeft => "down_left",
            Anchor::DownRight => "down_right",
        };
        f.write_str(name)
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Anchor::ALL
            .into_iter()
            .find(|a| a.to_string() == normalized)
            .ok_or_else(|| format!("unknown anchor: {s}"))
    }
}
