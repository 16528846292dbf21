//! The canonical in-memory raster every other module operates on.
//!
//! A [`PixelBuffer`] is a tagged union over three pixel layouts:
//!
//! | Layout | Storage | Alpha |
//! |---|---|---|
//! | [`Pixels::Rgb`] | `[r, g, b]` per pixel | always opaque |
//! | [`Pixels::Rgba`] | `[r, g, b, a]` per pixel, straight alpha | per pixel |
//! | [`Pixels::Indexed`] | one palette index per pixel + [`Palette`] | optional transparent index |
//!
//! Geometry and resize code reads and writes pixels through the uniform
//! [`PixelBuffer::get`] / [`PixelBuffer::set`] accessors, which resolve
//! palette lookups internally. Writing a color the palette cannot represent
//! promotes the buffer to RGBA.
//!
//! Invariant: pixel storage length is always `width * height`, and both
//! dimensions are positive.

use super::color::{Color, FillPolicy};
use super::error::{ImagingError, Result, check_dimensions};
use image::RgbaImage;
use serde::Serialize;
use std::fmt;

/// Pixel layout tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb,
    Rgba,
    Indexed,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixelFormat::Rgb => "rgb",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Indexed => "indexed",
        })
    }
}

/// Color table of an indexed image: at most 256 entries, optionally one of
/// them designated fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
    transparent: Option<u8>,
}

impl Palette {
    pub fn new(colors: Vec<[u8; 3]>, transparent: Option<u8>) -> Result<Self> {
        if colors.is_empty() || colors.len() > 256 {
            return Err(ImagingError::decode(format!(
                "palette must hold 1-256 entries, got {}",
                colors.len()
            )));
        }
        if let Some(t) = transparent
            && t as usize >= colors.len()
        {
            return Err(ImagingError::decode(format!(
                "transparent index {t} outside palette of {} entries",
                colors.len()
            )));
        }
        Ok(Self {
            colors,
            transparent,
        })
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn transparent(&self) -> Option<u8> {
        self.transparent
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Resolve an index to its color; the transparent index has alpha 0.
    pub fn color(&self, index: u8) -> Color {
        if self.transparent == Some(index) {
            return Color::TRANSPARENT;
        }
        match self.colors.get(index as usize) {
            Some(&[r, g, b]) => Color::rgb(r, g, b),
            None => Color::TRANSPARENT,
        }
    }

    /// Find the index representing `color` exactly, if any.
    pub fn index_of(&self, color: Color) -> Option<u8> {
        if color.a == 0 {
            return self.transparent;
        }
        if !color.is_opaque() {
            return None;
        }
        self.colors
            .iter()
            .enumerate()
            .find(|&(i, c)| *c == color.to_rgb() && self.transparent != Some(i as u8))
            .map(|(i, _)| i as u8)
    }
}

/// Pixel storage, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pixels {
    Rgb(Vec<[u8; 3]>),
    Rgba(Vec<[u8; 4]>),
    Indexed { indices: Vec<u8>, palette: Palette },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Pixels,
}

impl PixelBuffer {
    /// Build a buffer, checking the size and palette invariants.
    pub fn new(width: u32, height: u32, pixels: Pixels) -> Result<Self> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        let actual = match &pixels {
            Pixels::Rgb(p) => p.len(),
            Pixels::Rgba(p) => p.len(),
            Pixels::Indexed { indices, palette } => {
                if let Some(bad) = indices.iter().find(|&&i| i as usize >= palette.len()) {
                    return Err(ImagingError::decode(format!(
                        "pixel index {bad} outside palette of {} entries",
                        palette.len()
                    )));
                }
                indices.len()
            }
        };
        if actual != expected {
            return Err(ImagingError::geometry(format!(
                "{width}x{height} buffer needs {expected} pixels, got {actual}"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn rgb(width: u32, height: u32, data: Vec<[u8; 3]>) -> Result<Self> {
        Self::new(width, height, Pixels::Rgb(data))
    }

    pub fn rgba(width: u32, height: u32, data: Vec<[u8; 4]>) -> Result<Self> {
        Self::new(width, height, Pixels::Rgba(data))
    }

    pub fn indexed(width: u32, height: u32, indices: Vec<u8>, palette: Palette) -> Result<Self> {
        Self::new(width, height, Pixels::Indexed { indices, palette })
    }

    /// A canvas of one color. Opaque colors give an RGB buffer.
    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self> {
        let n = width as usize * height as usize;
        if color.is_opaque() {
            Self::rgb(width, height, vec![color.to_rgb(); n])
        } else {
            Self::rgba(width, height, vec![color.to_array(); n])
        }
    }

    /// Build an RGBA buffer pixel by pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Color) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y).to_array());
            }
        }
        Self::rgba(width, height, data)
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

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    pub fn format(&self) -> PixelFormat {
        match self.pixels {
            Pixels::Rgb(_) => PixelFormat::Rgb,
            Pixels::Rgba(_) => PixelFormat::Rgba,
            Pixels::Indexed { .. } => PixelFormat::Indexed,
        }
    }

    pub fn palette(&self) -> Option<&Palette> {
        match &self.pixels {
            Pixels::Indexed { palette, .. } => Some(palette),
            _ => None,
        }
    }

    /// True if the layout can carry transparency at all.
    pub fn has_alpha(&self) -> bool {
        match &self.pixels {
            Pixels::Rgb(_) => false,
            Pixels::Rgba(_) => true,
            Pixels::Indexed { palette, .. } => palette.transparent().is_some(),
        }
    }

    /// True if no pixel is even partially transparent.
    pub fn is_opaque(&self) -> bool {
        match &self.pixels {
            Pixels::Rgb(_) => true,
            Pixels::Rgba(p) => p.iter().all(|px| px[3] == 255),
            Pixels::Indexed { indices, palette } => match palette.transparent() {
                None => true,
                Some(t) => !indices.contains(&t),
            },
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// Pixel at `(x, y)` as RGBA. Panics if out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Color {
        let i = self.offset(x, y);
        match &self.pixels {
            Pixels::Rgb(p) => {
                let [r, g, b] = p[i];
                Color::rgb(r, g, b)
            }
            Pixels::Rgba(p) => Color::from_array(p[i]),
            Pixels::Indexed { indices, palette } => palette.color(indices[i]),
        }
    }

    /// Pixel at signed coordinates, `None` outside the buffer.
    pub fn get_checked(&self, x: i64, y: i64) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.get(x as u32, y as u32))
    }

    /// Overwrite the pixel at `(x, y)`, promoting the layout if the color
    /// cannot be stored as-is.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let i = self.offset(x, y);
        match &mut self.pixels {
            Pixels::Rgba(p) => p[i] = color.to_array(),
            Pixels::Rgb(p) if color.is_opaque() => p[i] = color.to_rgb(),
            Pixels::Indexed { indices, palette } if palette.index_of(color).is_some() => {
                if let Some(idx) = palette.index_of(color) {
                    indices[i] = idx;
                }
            }
            _ => {
                self.promote_to_rgba();
                if let Pixels::Rgba(p) = &mut self.pixels {
                    p[i] = color.to_array();
                }
            }
        }
    }

    /// Expand any layout to straight RGBA pixels.
    pub fn to_rgba_vec(&self) -> Vec<[u8; 4]> {
        match &self.pixels {
            Pixels::Rgb(p) => p.iter().map(|&[r, g, b]| [r, g, b, 255]).collect(),
            Pixels::Rgba(p) => p.clone(),
            Pixels::Indexed { indices, palette } => {
                let lut: Vec<[u8; 4]> = (0..=255u8).map(|i| palette.color(i).to_array()).collect();
                indices.iter().map(|&i| lut[i as usize]).collect()
            }
        }
    }

    pub fn promote_to_rgba(&mut self) {
        if !matches!(self.pixels, Pixels::Rgba(_)) {
            self.pixels = Pixels::Rgba(self.to_rgba_vec());
        }
    }

    /// Drop the alpha channel if every pixel is opaque.
    pub fn into_rgb_if_opaque(self) -> Self {
        match self.pixels {
            Pixels::Rgba(p) if p.iter().all(|px| px[3] == 255) => Self {
                width: self.width,
                height: self.height,
                pixels: Pixels::Rgb(p.into_iter().map(|[r, g, b, _]| [r, g, b]).collect()),
            },
            pixels => Self { pixels, ..self },
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for (dst, px) in img.chunks_exact_mut(4).zip(self.to_rgba_vec()) {
            dst.copy_from_slice(&px);
        }
        img
    }

    pub fn from_rgba_image(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        let data = img
            .into_raw()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        Self::rgba(width, height, data)
    }

    /// Composite every pixel onto an opaque background, yielding RGB.
    pub fn flatten(&self, background: Color) -> PixelBuffer {
        let bg = Color::rgb(background.r, background.g, background.b);
        let data = match &self.pixels {
            Pixels::Rgb(p) => p.clone(),
            _ => self
                .to_rgba_vec()
                .into_iter()
                .map(|px| Color::from_array(px).over(bg).to_rgb())
                .collect(),
        };
        PixelBuffer {
            width: self.width,
            height: self.height,
            pixels: Pixels::Rgb(data),
        }
    }

    /// Apply a color transform to every pixel. Indexed buffers transform
    /// their palette instead, keeping the transparent index intact.
    pub fn map_colors(&self, f: impl Fn(Color) -> Color) -> PixelBuffer {
        let pixels = match &self.pixels {
            Pixels::Rgb(p) => Pixels::Rgb(
                p.iter()
                    .map(|&[r, g, b]| f(Color::rgb(r, g, b)).to_rgb())
                    .collect(),
            ),
            Pixels::Rgba(p) => Pixels::Rgba(
                p.iter()
                    .map(|&px| f(Color::from_array(px)).to_array())
                    .collect(),
            ),
            Pixels::Indexed { indices, palette } => {
                let colors = palette
                    .colors()
                    .iter()
                    .enumerate()
                    .map(|(i, &[r, g, b])| {
                        if palette.transparent() == Some(i as u8) {
                            [r, g, b]
                        } else {
                            f(Color::rgb(r, g, b)).to_rgb()
                        }
                    })
                    .collect();
                Pixels::Indexed {
                    indices: indices.clone(),
                    palette: Palette {
                        colors,
                        transparent: palette.transparent(),
                    },
                }
            }
        };
        PixelBuffer {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Copy the rectangle `(x, y, width, height)` onto a new canvas of exactly
    /// that size. The rectangle may extend past the buffer on any side; those
    /// regions take the fill. Source pixels are blended over the fill.
    ///
    /// An indexed source with a transparent index stays indexed when the fill
    /// is transparent, so the palette survives the crop.
    pub fn extract(
        &self,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        fill: FillPolicy,
    ) -> Result<PixelBuffer> {
        check_dimensions(width, height)?;

        if let Pixels::Indexed { indices, palette } = &self.pixels
            && let (FillPolicy::Transparent, Some(t)) = (fill, palette.transparent())
        {
            let mut out = vec![t; width as usize * height as usize];
            for (row, dy) in (0..height as i64).enumerate() {
                let sy = y + dy;
                if sy < 0 || sy >= self.height as i64 {
                    continue;
                }
                for dx in 0..width as i64 {
                    let sx = x + dx;
                    if sx < 0 || sx >= self.width as i64 {
                        continue;
                    }
                    out[row * width as usize + dx as usize] =
                        indices[sy as usize * self.width as usize + sx as usize];
                }
            }
            return PixelBuffer::indexed(width, height, out, palette.clone());
        }

        let mut canvas = PixelBuffer::filled(width, height, fill.color())?;
        canvas.composite_over(self, -x, -y);
        Ok(canvas)
    }

    /// Blend `src` over `self` with its top-left corner at `(x, y)`; parts
    /// falling outside `self` are clipped.
    pub fn composite_over(&mut self, src: &PixelBuffer, x: i64, y: i64) {
        if matches!(self.pixels, Pixels::Indexed { .. }) {
            self.promote_to_rgba();
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + src.width as i64).min(self.width as i64);
        let y1 = (y + src.height as i64).min(self.height as i64);
        for dy in y0..y1 {
            for dx in x0..x1 {
                let s = src.get((dx - x) as u32, (dy - y) as u32);
                if s.a == 0 {
                    continue;
                }
                let (ux, uy) = (dx as u32, dy as u32);
                let blended = s.over(self.get(ux, uy));
                self.set(ux, uy, blended);
            }
        }
    }

    /// Draw a small cross centered on `(x, y)`, in place. Parts outside the
    /// buffer are skipped.
    pub fn mark_point(&mut self, x: i64, y: i64, color: Color) {
        const ARM: i64 = 5;
        for d in -ARM..=ARM {
            for (px, py) in [(x + d, y), (x, y + d)] {
                if px >= 0 && py >= 0 && px < self.width as i64 && py < self.height as i64 {
                    self.set(px as u32, py as u32, color);
                }
            }
        }
    }
}
