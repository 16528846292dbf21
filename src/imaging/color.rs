//! Colors and the fill-or-transparent policy.
//!
//! Colors are written as CSS-style hex strings in settings files and on the
//! command line: `#rgb`, `#rrggbb` or `#rrggbbaa`. A [`FillPolicy`] is either
//! such a color or the literal `transparent`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_array(px: [u8; 4]) -> Self {
        Self::rgba(px[0], px[1], px[2], px[3])
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Source-over blend of `self` onto `dst`.
    pub fn over(self, dst: Color) -> Color {
        match (self.a, dst.a) {
            (255, _) => self,
            (0, _) => dst,
            (_, 255) => {
                let a = self.a as u32;
                let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
                Color::rgb(
                    mix(self.r, dst.r),
                    mix(self.g, dst.g),
                    mix(self.b, dst.b),
                )
            }
            _ => {
                let sa = self.a as f32 / 255.0;
                let da = dst.a as f32 / 255.0;
                let out_a = sa + da * (1.0 - sa);
                let mix = |s: u8, d: u8| {
                    let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
                    v.round().clamp(0.0, 255.0) as u8
                };
                Color::rgba(
                    mix(self.r, dst.r),
                    mix(self.g, dst.g),
                    mix(self.b, dst.b),
                    (out_a * 255.0).round() as u8,
                )
            }
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("color must start with '#': {s}"))?;
        if !hex.is_ascii() {
            return Err(format!("invalid hex color: {s}"));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid hex color: {s}"))
        };
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|v| v * 17)
                .map_err(|_| format!("invalid hex color: {s}"))
        };
        match hex.len() {
            3 => Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(format!("invalid hex color length: {s}")),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What to put where no source pixel lands: margins, out-of-bounds crop
/// regions, rotated corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    #[default]
    Transparent,
    Color(Color),
}

impl FillPolicy {
    /// The pixel value written into unfilled regions.
    pub fn color(self) -> Color {
        match self {
            FillPolicy::Transparent => Color::TRANSPARENT,
            FillPolicy::Color(c) => c,
        }
    }

    /// True if the fill can introduce non-opaque pixels.
    pub fn is_transparent(self) -> bool {
        !self.color().is_opaque()
    }
}

impl From<Color> for FillPolicy {
    fn from(c: Color) -> Self {
        FillPolicy::Color(c)
    }
}

impl fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillPolicy::Transparent => f.write_str("transparent"),
            FillPolicy::Color(c) => c.fmt(f),
        }
    }
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("transparent") {
            Ok(FillPolicy::Transparent)
        } else {
            s.parse().map(FillPolicy::Color)
        }
    }
}

impl Serialize for FillPolicy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FillPolicy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_forms() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!(
            "#10203040".parse::<Color>().unwrap(),
            Color::rgba(0x10, 0x20, 0x30, 0x40)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("red".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
    }

    #[test]
    fn display_roundtrips() {
        let c = Color::rgba(1, 2, 3, 4);
        assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
        assert_eq!(Color::RED.to_string(), "#ff0000");
    }

    #[test]
    fn over_opaque_source_wins() {
        assert_eq!(Color::RED.over(Color::WHITE), Color::RED);
    }

    #[test]
    fn over_transparent_source_keeps_destination() {
        assert_eq!(Color::TRANSPARENT.over(Color::WHITE), Color::WHITE);
    }

    #[test]
    fn over_half_alpha_mixes() {
        let half_black = Color::rgba(0, 0, 0, 128);
        let mixed = half_black.over(Color::WHITE);
        assert!(mixed.r > 120 && mixed.r < 135, "got {mixed:?}");
        assert_eq!(mixed.a, 255);
    }

    #[test]
    fn fill_policy_parse() {
        assert_eq!(
            "transparent".parse::<FillPolicy>().unwrap(),
            FillPolicy::Transparent
        );
        assert_eq!(
            "#00ff00".parse::<FillPolicy>().unwrap(),
            FillPolicy::Color(Color::rgb(0, 255, 0))
        );
    }

    #[test]
    fn fill_policy_transparency() {
        assert!(FillPolicy::Transparent.is_transparent());
        assert!(!FillPolicy::Color(Color::RED).is_transparent());
        assert!(FillPolicy::Color(Color::rgba(1, 1, 1, 10)).is_transparent());
    }
}
