//! Pure calculation functions for image dimensions and crop windows.
//!
//! All functions here are pure and testable without any I/O or images.
//! Window coordinates are signed: a window may start left of / above the
//! source or extend past its far edge, and the caller pads.

use super::params::Anchor;

/// A rectangle in source coordinates. `x`/`y` may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Largest size with the source aspect ratio that fits inside `target`.
///
/// The constrained axis matches the target exactly, the other is floored
/// (never below 1). With `allow_enlarge` false the source size is returned
/// when fitting would grow the image.
///
/// # Examples
/// ```
/// # use rendition::imaging::calculate_fit_dimensions;
/// // 150x55 into a 75x75 box → 75x27
/// assert_eq!(calculate_fit_dimensions((150, 55), (75, 75), true), (75, 27));
///
/// // Without enlarging, a small source keeps its size
/// assert_eq!(calculate_fit_dimensions((150, 55), (300, 300), false), (150, 55));
/// ```
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    target: (u32, u32),
    allow_enlarge: bool,
) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1) as u64, source.1.max(1) as u64);
    let (tgt_w, tgt_h) = (target.0.max(1) as u64, target.1.max(1) as u64);

    let (w, h) = if src_w * tgt_h >= src_h * tgt_w {
        // Source is wider: width is the constraint
        (tgt_w, src_h * tgt_w / src_w)
    } else {
        // Source is taller: height is the constraint
        (src_w * tgt_h / src_h, tgt_h)
    };

    if !allow_enlarge && w > src_w {
        return (src_w as u32, src_h as u32);
    }
    (w.max(1) as u32, h.max(1) as u32)
}

/// Calculate dimensions needed to cover a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other is
/// rounded up so the result is never smaller than the target.
pub fn calculate_cover_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1) as u64, source.1.max(1) as u64);
    let (tgt_w, tgt_h) = (target.0.max(1) as u64, target.1.max(1) as u64);

    if src_w * tgt_h > src_h * tgt_w {
        // Source is wider: height matches, width exceeds
        let w = (tgt_h * src_w).div_ceil(src_h);
        (w.max(tgt_w) as u32, tgt_h as u32)
    } else {
        // Source is taller: width matches, height exceeds
        let h = (tgt_w * src_h).div_ceil(src_w);
        (tgt_w as u32, h.max(tgt_h) as u32)
    }
}

/// Source size multiplied by `factor`, rounded, at least 1x1.
pub fn calculate_scaled_dimensions(source: (u32, u32), factor: f64) -> (u32, u32) {
    let scale = |v: u32| ((v as f64 * factor).round() as u32).max(1);
    (scale(source.0), scale(source.1))
}

/// Offset of an `inner`-sized span inside an `outer`-sized span for one
/// anchor axis (`half`: 0 = start, 1 = middle, 2 = end). Negative when
/// `inner` is larger.
pub fn anchor_offset(outer: u32, inner: u32, half: i64) -> i64 {
    (outer as i64 - inner as i64) * half / 2
}

/// Position of an `inner` image on an `outer` canvas for the given anchor.
pub fn anchor_position(outer: (u32, u32), inner: (u32, u32), anchor: Anchor) -> (i64, i64) {
    let (hx, hy) = anchor.halves();
    (
        anchor_offset(outer.0, inner.0, hx),
        anchor_offset(outer.1, inner.1, hy),
    )
}

/// Crop window of exactly `target` size (each side clamped to ≥1) placed
/// against the source according to `anchor`.
///
/// Corner and edge anchors put the window flush with those source edges;
/// the center anchor centers it. When the window is larger than the source
/// the coordinates go negative / past the far edge.
pub fn resolve_crop_window(
    source: (u32, u32),
    target: (u32, u32),
    anchor: Anchor,
) -> CropWindow {
    let width = target.0.max(1);
    let height = target.1.max(1);
    let (x, y) = anchor_position(source, (width, height), anchor);
    CropWindow {
        x,
        y,
        width,
        height,
    }
}

/// Window for a crop centered on `point`.
///
/// Without `allow_scaling` the window is the output size (clipped to the
/// source size), centered on the point and shifted to stay inside the source.
///
/// With `allow_scaling` the window takes the output's aspect ratio and is the
/// largest such rectangle centered exactly on the point that still fits the
/// source. The caller resamples it to the output size. A point on the border
/// leaves no room to center on, so the largest aspect window that fits the
/// source is used instead, shifted inside.
pub fn resolve_point_window(
    source: (u32, u32),
    point: (i64, i64),
    output: (u32, u32),
    allow_scaling: bool,
) -> CropWindow {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let (out_w, out_h) = (output.0.max(1), output.1.max(1));
    let px = point.0.clamp(0, src_w as i64);
    let py = point.1.clamp(0, src_h as i64);

    let (width, height) = if allow_scaling {
        let aspect = out_w as f64 / out_h as f64;
        let half_w = px.min(src_w as i64 - px) as f64;
        let half_h = py.min(src_h as i64 - py) as f64;
        let w = (2.0 * half_w).min(2.0 * half_h * aspect);
        if w >= 1.0 && w / aspect >= 1.0 {
            (w, w / aspect)
        } else {
            let w = (src_w as f64).min(src_h as f64 * aspect);
            (w, w / aspect)
        }
    } else {
        (out_w.min(src_w) as f64, out_h.min(src_h) as f64)
    };

    let width = (width.round() as u32).clamp(1, src_w);
    let height = (height.round() as u32).clamp(1, src_h);
    let x = (px - width as i64 / 2).clamp(0, (src_w - width) as i64);
    let y = (py - height as i64 / 2).clamp(0, (src_h - height) as i64);
    CropWindow {
        x,
        y,
        width,
        height,
    }
}
