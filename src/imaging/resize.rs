//! Quality-profile-driven scaling.
//!
//! Every resampling in the crate funnels through [`scale_exact`]:
//!
//! 1. Alpha is premultiplied so transparent pixels do not bleed color.
//! 2. While the remaining reduction on an axis exceeds 2x, that axis is
//!    halved with a 2x2 box filter.
//! 3. One final pass with the profile's kernel reaches the exact size.
//! 4. Non-speed profiles sharpen downscaled results with an unsharp mask on
//!    the straight (unpremultiplied) color channels, provided the output
//!    area stays under `maximum_blur_size`. Alpha is never sharpened.
//!
//! [`resize`] layers the four sizing modes (exact, fit, letterbox, cover) on
//! top, each resampling exactly once.

use super::buffer::{PixelBuffer, PixelFormat};
use super::calculations::{
    anchor_position, calculate_fit_dimensions, calculate_scaled_dimensions, resolve_crop_window,
};
use super::color::FillPolicy;
use super::error::{ImagingError, Result, check_dimensions};
use super::geometry::crop_to_size;
use super::params::{Anchor, Sharpening};
use crate::config::RenderSettings;
use image::{Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_allow_enlarge() -> bool {
    true
}

/// Parameters of a [`resize`] call.
///
/// | `fill` | `anchor` | Mode |
/// |---|---|---|
/// | none | none | exact (`keep_aspect = false`) or fit (`keep_aspect = true`) |
/// | set | any | letterbox: fit, then composite onto a full-size canvas |
/// | none | set | cover: scale to cover the box, crop the overflow |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResizeRequest {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub keep_aspect: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    #[serde(default = "default_allow_enlarge")]
    pub allow_enlarge: bool,
}

/// The sizing strategy a [`ResizeRequest`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    Exact,
    Fit,
    Letterbox { fill: FillPolicy, anchor: Anchor },
    Cover { anchor: Anchor },
}

impl ResizeRequest {
    /// Scale to exactly `width` x `height`, ignoring aspect ratio.
    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            keep_aspect: false,
            fill: None,
            anchor: None,
            allow_enlarge: true,
        }
    }

    /// Largest aspect-preserving size inside the box.
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            keep_aspect: true,
            ..Self::exact(width, height)
        }
    }

    /// Fit, then pad to exactly the box with `fill`.
    pub fn letterbox(width: u32, height: u32, fill: FillPolicy, anchor: Anchor) -> Self {
        Self {
            fill: Some(fill),
            anchor: Some(anchor),
            ..Self::fit(width, height)
        }
    }

    /// Cover the box and crop the overflow at `anchor`.
    pub fn cover(width: u32, height: u32, anchor: Anchor) -> Self {
        Self {
            anchor: Some(anchor),
            ..Self::fit(width, height)
        }
    }

    pub fn allow_enlarge(mut self, allow: bool) -> Self {
        self.allow_enlarge = allow;
        self
    }

    pub fn mode(&self) -> ResizeMode {
        match (self.fill, self.anchor) {
            (Some(fill), anchor) => ResizeMode::Letterbox {
                fill,
                anchor: anchor.unwrap_or_default(),
            },
            (None, Some(anchor)) => ResizeMode::Cover { anchor },
            (None, None) if self.keep_aspect => ResizeMode::Fit,
            (None, None) => ResizeMode::Exact,
        }
    }
}

/// Resize according to `request`. See [`ResizeRequest`] for the modes.
///
/// With `allow_enlarge` false the effective scale never exceeds 1: exact
/// and fit keep the native size on axes that would grow, letterbox and cover
/// keep the full output box and pad around the unscaled image.
#[tracing::instrument(skip(buffer, settings), fields(src_w = buffer.width(), src_h = buffer.height()))]
pub fn resize(
    buffer: &PixelBuffer,
    request: &ResizeRequest,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    check_dimensions(request.width, request.height)?;
    let source = buffer.dimensions();
    let target = (request.width, request.height);

    match request.mode() {
        ResizeMode::Exact => {
            let (w, h) = if request.allow_enlarge {
                target
            } else {
                (target.0.min(source.0), target.1.min(source.1))
            };
            scale_exact(buffer, w, h, settings)
        }
        ResizeMode::Fit => {
            let (w, h) = calculate_fit_dimensions(source, target, request.allow_enlarge);
            scale_exact(buffer, w, h, settings)
        }
        ResizeMode::Letterbox { fill, anchor } => {
            let inner = calculate_fit_dimensions(source, target, request.allow_enlarge);
            let scaled = scale_exact(buffer, inner.0, inner.1, settings)?;
            let (x, y) = anchor_position(target, inner, anchor);
            let mut canvas = PixelBuffer::filled(target.0, target.1, fill.color())?;
            canvas.composite_over(&scaled, x, y);
            Ok(canvas)
        }
        ResizeMode::Cover { anchor } => cover(buffer, target, anchor, request.allow_enlarge, settings),
    }
}

/// Scale so the image covers `target`, then cut `target` out at `anchor`.
/// The source window is picked first so only one resample happens.
fn cover(
    buffer: &PixelBuffer,
    target: (u32, u32),
    anchor: Anchor,
    allow_enlarge: bool,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    let (src_w, src_h) = buffer.dimensions();
    let scale = (target.0 as f64 / src_w as f64).max(target.1 as f64 / src_h as f64);

    let window_size = if scale > 1.0 && !allow_enlarge {
        target
    } else {
        (
            ((target.0 as f64 / scale).round() as u32).clamp(1, src_w),
            ((target.1 as f64 / scale).round() as u32).clamp(1, src_h),
        )
    };
    let window = resolve_crop_window((src_w, src_h), window_size, anchor);
    debug!(?window, scale, "cover window");
    crop_to_size(
        buffer,
        window.x,
        window.y,
        window.width,
        window.height,
        target.0,
        target.1,
        None,
        settings,
    )
}

/// Multiply the image size by `factor` (rounded, at least 1x1).
pub fn scale(buffer: &PixelBuffer, factor: f64, settings: &RenderSettings) -> Result<PixelBuffer> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ImagingError::geometry(format!(
            "scale factor must be positive, got {factor}"
        )));
    }
    let (w, h) = calculate_scaled_dimensions(buffer.dimensions(), factor);
    scale_exact(buffer, w, h, settings)
}

/// Resample to exactly `width` x `height`.
///
/// RGB sources stay RGB; everything else comes back as RGBA.
pub fn scale_exact(
    buffer: &PixelBuffer,
    width: u32,
    height: u32,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    check_dimensions(width, height)?;
    if buffer.dimensions() == (width, height) {
        return Ok(buffer.clone());
    }

    let profile = settings.profile;
    let mut img = premultiply(buffer.to_rgba_image());

    let mut passes = 0;
    loop {
        let halve_x = img.width() as u64 > width as u64 * 2;
        let halve_y = img.height() as u64 > height as u64 * 2;
        if !halve_x && !halve_y {
            break;
        }
        img = halve(&img, halve_x, halve_y);
        passes += 1;
    }
    if passes > 0 {
        debug!(passes, "progressive halving");
    }

    if img.dimensions() != (width, height) {
        img = imageops::resize(&img, width, height, profile.interpolation().filter_type());
    }

    let mut img = unpremultiply(img);
    let area = width as u64 * height as u64;
    if let Some(sharpening) = profile.sharpening()
        && area < buffer.area()
    {
        if area <= settings.maximum_blur_size {
            img = sharpen_color(&img, sharpening);
        } else {
            debug!(
                area,
                limit = settings.maximum_blur_size,
                "skipping sharpen above blur ceiling"
            );
        }
    }

    let out = PixelBuffer::from_rgba_image(img)?;
    Ok(if buffer.format() == PixelFormat::Rgb {
        out.into_rgb_if_opaque()
    } else {
        out
    })
}

/// Unsharp mask on straight color. Alpha keeps its resampled value.
fn sharpen_color(img: &RgbaImage, sharpening: Sharpening) -> RgbaImage {
    let mut sharpened = imageops::unsharpen(img, sharpening.sigma, sharpening.threshold);
    for (out, src) in sharpened.pixels_mut().zip(img.pixels()) {
        out[3] = src[3];
    }
    sharpened
}

/// 2x box reduction on the selected axes. Odd edges reuse the last sample.
fn halve(img: &RgbaImage, halve_x: bool, halve_y: bool) -> RgbaImage {
    let (w, h) = img.dimensions();
    let new_w = if halve_x { w.div_ceil(2) } else { w };
    let new_h = if halve_y { h.div_ceil(2) } else { h };
    let pair = |v: u32, halve: bool, limit: u32| {
        if halve {
            [2 * v, (2 * v + 1).min(limit - 1)]
        } else {
            [v, v]
        }
    };
    RgbaImage::from_fn(new_w, new_h, |x, y| {
        let xs = pair(x, halve_x, w);
        let ys = pair(y, halve_y, h);
        let mut sum = [0u32; 4];
        for sy in ys {
            for sx in xs {
                let px = img.get_pixel(sx, sy);
                for (acc, &c) in sum.iter_mut().zip(px.0.iter()) {
                    *acc += c as u32;
                }
            }
        }
        Rgba(sum.map(|s| ((s + 2) / 4) as u8))
    })
}

fn premultiply(mut img: RgbaImage) -> RgbaImage {
    for px in img.pixels_mut() {
        let a = px[3] as u32;
        if a < 255 {
            for c in &mut px.0[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }
    img
}

fn unpremultiply(mut img: RgbaImage) -> RgbaImage {
    for px in img.pixels_mut() {
        let a = px[3] as u32;
        match a {
            255 => {}
            0 => px.0 = [0, 0, 0, 0],
            _ => {
                for c in &mut px.0[..3] {
                    *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
    img
}
