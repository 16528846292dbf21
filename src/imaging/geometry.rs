//! Anchored and rectangular crops, with padding and optional rescaling.
//!
//! Crop rectangles may extend past the source on any side. Those regions are
//! never an error: they are painted with the fill (the settings fill unless
//! [`crop_to_size`] is given its own), or left transparent. [`crop_to_size`]
//! combines crop and resize into a single resampling pass.

use super::buffer::PixelBuffer;
use super::calculations::{resolve_crop_window, resolve_point_window};
use super::color::FillPolicy;
use super::error::{Result, check_dimensions};
use super::params::Anchor;
use super::resize::scale_exact;
use crate::config::RenderSettings;

/// Cut a `width` x `height` window positioned by `anchor`, without scaling.
pub fn crop(
    buffer: &PixelBuffer,
    width: u32,
    height: u32,
    anchor: Anchor,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    check_dimensions(width, height)?;
    let window = resolve_crop_window(buffer.dimensions(), (width, height), anchor);
    buffer.extract(window.x, window.y, width, height, settings.fill)
}

/// Cut the raw rectangle `(x, y, width, height)`, padding what lies outside.
pub fn crop_rect(
    buffer: &PixelBuffer,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    crop_to_size(buffer, x, y, width, height, width, height, None, settings)
}

/// Extract `(x, y, width, height)` onto an `out_width` x `out_height` canvas.
///
/// The part of the rectangle that overlaps the source is scaled by
/// `out / window` on each axis and placed where it falls in the output;
/// the rest of the canvas takes `fill`, or the settings fill when `None`.
#[allow(clippy::too_many_arguments)]
pub fn crop_to_size(
    buffer: &PixelBuffer,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    out_width: u32,
    out_height: u32,
    fill: Option<FillPolicy>,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    check_dimensions(width, height)?;
    check_dimensions(out_width, out_height)?;
    let fill = fill.unwrap_or(settings.fill);
    if (width, height) == (out_width, out_height) {
        return buffer.extract(x, y, width, height, fill);
    }

    let (src_w, src_h) = (buffer.width() as i64, buffer.height() as i64);
    let (x0, y0) = (x.max(0), y.max(0));
    let x1 = (x + width as i64).min(src_w);
    let y1 = (y + height as i64).min(src_h);

    if x0 >= x1 || y0 >= y1 {
        return PixelBuffer::filled(out_width, out_height, fill.color());
    }

    let visible = buffer.extract(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32, fill)?;
    let inside = (x0, y0, x1, y1) == (x, y, x + width as i64, y + height as i64);
    if inside {
        return scale_exact(&visible, out_width, out_height, settings);
    }

    let sx = out_width as f64 / width as f64;
    let sy = out_height as f64 / height as f64;
    let map = |v: i64, origin: i64, s: f64| ((v - origin) as f64 * s).round() as i64;
    let (dx0, dy0) = (map(x0, x, sx), map(y0, y, sy));
    let (dx1, dy1) = (map(x1, x, sx), map(y1, y, sy));
    let scaled_w = ((dx1 - dx0).max(1) as u32).min(out_width);
    let scaled_h = ((dy1 - dy0).max(1) as u32).min(out_height);

    let scaled = scale_exact(&visible, scaled_w, scaled_h, settings)?;
    let mut canvas = PixelBuffer::filled(out_width, out_height, fill.color())?;
    canvas.composite_over(&scaled, dx0, dy0);
    Ok(canvas)
}

/// Crop around a point of interest.
///
/// Without `allow_scaling`, returns an `out_width` x `out_height` window
/// centered on the point and shifted inside the source (smaller if the
/// source is). With it, the largest window of the output's aspect ratio
/// centered on the point is resampled to the output size, so the result
/// is downscaled or upscaled as needed.
pub fn crop_point_to_size(
    buffer: &PixelBuffer,
    x: i64,
    y: i64,
    allow_scaling: bool,
    out_width: u32,
    out_height: u32,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    check_dimensions(out_width, out_height)?;
    let window = resolve_point_window(
        buffer.dimensions(),
        (x, y),
        (out_width, out_height),
        allow_scaling,
    );
    if !allow_scaling {
        return buffer.extract(
            window.x,
            window.y,
            window.width,
            window.height,
            settings.fill,
        );
    }
    crop_to_size(
        buffer,
        window.x,
        window.y,
        window.width,
        window.height,
        out_width,
        out_height,
        None,
        settings,
    )
}
