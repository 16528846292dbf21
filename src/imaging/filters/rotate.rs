//! Arbitrary-angle rotation about the image center.
//!
//! Positive angles turn clockwise on screen (y axis pointing down). The
//! canvas grows to the rotated bounding box; corners no source pixel reaches
//! take the settings fill.

use super::ImageFilter;
use crate::config::RenderSettings;
use crate::imaging::buffer::PixelBuffer;
use crate::imaging::color::{Color, FillPolicy};
use crate::imaging::error::Result;
use crate::imaging::params::{Interpolation, QualityProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rotate {
    /// Radians.
    pub angle: f64,
}

impl Rotate {
    pub fn new(angle: f64) -> Self {
        Self { angle }
    }

    /// `(|cos|, |sin|)` with float noise at the axis angles removed.
    fn extents(&self) -> (f64, f64) {
        let snap = |v: f64| if v.abs() < 1e-9 { 0.0 } else { v.abs() };
        (snap(self.angle.cos()), snap(self.angle.sin()))
    }
}

/// Rotation reuses bilinear for the fast profiles and Catmull-Rom otherwise.
fn rotation_kernel(profile: QualityProfile) -> Interpolation {
    match profile {
        QualityProfile::Speed | QualityProfile::QualitySoft => Interpolation::Bilinear,
        QualityProfile::Quality | QualityProfile::QualityBicubic => Interpolation::Bicubic,
    }
}

fn catmull_rom(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (-t3 + 2.0 * t2 - t) / 2.0,
        (3.0 * t3 - 5.0 * t2 + 2.0) / 2.0,
        (-3.0 * t3 + 4.0 * t2 + t) / 2.0,
        (t3 - t2) / 2.0,
    ]
}

/// Premultiplied RGBA samples with transparent black outside the image.
struct Source {
    width: i64,
    height: i64,
    pixels: Vec<[f64; 4]>,
}

impl Source {
    fn new(buffer: &PixelBuffer) -> Self {
        let pixels = buffer
            .to_rgba_vec()
            .into_iter()
            .map(|[r, g, b, a]| {
                let alpha = a as f64 / 255.0;
                [r as f64 * alpha, g as f64 * alpha, b as f64 * alpha, a as f64]
            })
            .collect();
        Self {
            width: buffer.width() as i64,
            height: buffer.height() as i64,
            pixels,
        }
    }

    fn at(&self, x: i64, y: i64) -> [f64; 4] {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return [0.0; 4];
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Sample at continuous pixel-index coordinates.
    fn sample(&self, x: f64, y: f64, kernel: Interpolation) -> [f64; 4] {
        let (x0, y0) = (x.floor(), y.floor());
        let (tx, ty) = (x - x0, y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let mut acc = [0.0; 4];
        let mut add = |px: [f64; 4], w: f64| {
            for (a, v) in acc.iter_mut().zip(px) {
                *a += v * w;
            }
        };
        match kernel {
            Interpolation::Nearest => add(self.at(x.round() as i64, y.round() as i64), 1.0),
            Interpolation::Bilinear => {
                for (dy, wy) in [(0, 1.0 - ty), (1, ty)] {
                    for (dx, wx) in [(0, 1.0 - tx), (1, tx)] {
                        add(self.at(x0 + dx, y0 + dy), wx * wy);
                    }
                }
            }
            Interpolation::Bicubic => {
                let (wxs, wys) = (catmull_rom(tx), catmull_rom(ty));
                for (j, wy) in wys.iter().enumerate() {
                    for (i, wx) in wxs.iter().enumerate() {
                        add(self.at(x0 + i as i64 - 1, y0 + j as i64 - 1), wx * wy);
                    }
                }
            }
        }
        acc
    }
}

impl ImageFilter for Rotate {
    fn apply(&self, buffer: &PixelBuffer, settings: &RenderSettings) -> Result<PixelBuffer> {
        let (src_w, src_h) = buffer.dimensions();
        let (width, height) = self.output_dimensions(src_w, src_h);
        let source = Source::new(buffer);
        let kernel = rotation_kernel(settings.profile);
        let (sin, cos) = self.angle.sin_cos();
        let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
        let (dst_cx, dst_cy) = (width as f64 / 2.0, height as f64 / 2.0);

        let rotated = PixelBuffer::from_fn(width, height, |x, y| {
            // Inverse mapping through pixel centers
            let dx = x as f64 + 0.5 - dst_cx;
            let dy = y as f64 + 0.5 - dst_cy;
            let sx = dx * cos + dy * sin + src_cx - 0.5;
            let sy = -dx * sin + dy * cos + src_cy - 0.5;
            let [r, g, b, a] = source.sample(sx, sy, kernel);
            let alpha = a.round().clamp(0.0, 255.0);
            if alpha == 0.0 {
                return Color::TRANSPARENT;
            }
            let un = |c: f64| (c * 255.0 / alpha).round().clamp(0.0, 255.0) as u8;
            Color::rgba(un(r), un(g), un(b), alpha as u8)
        })?;

        if settings.fill == FillPolicy::Transparent {
            return Ok(rotated);
        }
        let mut canvas = PixelBuffer::filled(width, height, settings.fill.color())?;
        canvas.composite_over(&rotated, 0, 0);
        Ok(canvas)
    }

    fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (cos, sin) = self.extents();
        let (w, h) = (width as f64, height as f64);
        let bound = |v: f64| ((v - 1e-6).ceil().max(1.0)) as u32;
        (bound(w * cos + h * sin), bound(w * sin + h * cos))
    }

    fn input_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let (bw, bh) = self.output_dimensions(width, height);
        let factor = (width as f64 / bw as f64).min(height as f64 / bh as f64);
        (
            ((width as f64 * factor).floor() as u32).max(1),
            ((height as f64 * factor).floor() as u32).max(1),
        )
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.angle.is_finite() {
            return Err(format!("rotation angle must be finite, got {}", self.angle));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn pattern() -> PixelBuffer {
        PixelBuffer::from_fn(6, 4, |x, y| {
            Color::rgb((x * 40) as u8, (y * 60) as u8, ((x + y) * 20) as u8)
        })
        .unwrap()
    }

    #[test]
    fn bounds_for_axis_angles() {
        assert_eq!(Rotate::new(0.0).output_dimensions(800, 600), (800, 600));
        assert_eq!(Rotate::new(PI).output_dimensions(800, 600), (800, 600));
        assert_eq!(Rotate::new(FRAC_PI_2).output_dimensions(800, 600), (600, 800));
    }

    #[test]
    fn bounds_for_diagonal() {
        let (w, h) = Rotate::new(FRAC_PI_4).output_dimensions(100, 100);
        assert_eq!((w, h), (142, 142));
    }

    #[test]
    fn rotate_by_pi_twice_restores_image() {
        let src = pattern();
        let r = Rotate::new(PI);
        let s = RenderSettings::default();
        let once = r.apply(&src, &s).unwrap();
        assert_eq!(once.get(0, 0), src.get(5, 3));
        let twice = r.apply(&once, &s).unwrap();
        assert_eq!(twice, src);
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let src = pattern();
        let out = Rotate::new(FRAC_PI_2).apply(&src, &RenderSettings::default()).unwrap();
        assert_eq!(out.dimensions(), (4, 6));
        // Clockwise: the source's bottom-left lands top-left
        assert_eq!(out.get(0, 0), src.get(0, 3));
        assert_eq!(out.get(3, 0), src.get(0, 0));
    }

    #[test]
    fn corners_take_fill() {
        let src = PixelBuffer::filled(40, 40, Color::RED).unwrap();
        let r = Rotate::new(FRAC_PI_4);
        let transparent = r.apply(&src, &RenderSettings::default()).unwrap();
        assert_eq!(transparent.get(0, 0).a, 0);
        assert_eq!(transparent.get(28, 28), Color::RED);

        let s = RenderSettings {
            fill: FillPolicy::Color(Color::WHITE),
            ..RenderSettings::default()
        };
        let filled = r.apply(&src, &s).unwrap();
        assert_eq!(filled.get(0, 0), Color::WHITE);
        assert!(filled.is_opaque());
    }

    #[test]
    fn reserve_fits_inside() {
        let r = Rotate::new(0.5);
        let (iw, ih) = r.input_dimensions(300, 200);
        let (ow, oh) = r.output_dimensions(iw, ih);
        assert!(ow <= 300 && oh <= 200, "{iw}x{ih} → {ow}x{oh}");
    }

    #[test]
    fn catmull_rom_partitions_unity() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f64 = catmull_rom(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert_eq!(catmull_rom(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn non_finite_angle_is_invalid() {
        assert!(Rotate::new(f64::INFINITY).validate().is_err());
        assert!(Rotate::new(1.0).validate().is_ok());
    }
}
