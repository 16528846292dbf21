//! Image processing: pure Rust, decoded into one in-memory pixel model.
//!
//! | Operation | Module / crate |
//! |---|---|
//! | **Decode / encode** | [`codec`]: `jpeg-decoder` (CMYK aware), `png`, `gif`, `image` encoders |
//! | **Crop** | [`geometry`]: anchored, rectangular, point-centered |
//! | **Resize** | [`resize`]: exact / fit / letterbox / cover, halving + `imageops::resize` + `unsharpen` |
//! | **Filters** | [`filters`]: grayscale, contrast, lookup, shadow, rotate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Anchors, quality profiles and colors describing operations
//! - **Buffer**: [`PixelBuffer`], the RGB / RGBA / indexed pixel store every operation consumes
//! - **Operations**: Codec, geometry, resize and filter functions built on the above
//!
//! Every operation takes its input by reference and returns a new buffer;
//! rendering options travel as a shared `&RenderSettings`.

mod buffer;
mod calculations;
pub mod codec;
mod color;
mod error;
pub mod filters;
pub mod geometry;
pub(crate) mod jpeg_markers;
mod params;
pub mod resize;

pub use buffer::{Palette, PixelBuffer, PixelFormat, Pixels};
pub use calculations::{
    CropWindow, anchor_position, calculate_cover_dimensions, calculate_fit_dimensions,
    calculate_scaled_dimensions, resolve_crop_window, resolve_point_window,
};
pub use codec::{ImageFormat, ImageInfo, decode, encode, identify, read, write};
pub use color::{Color, FillPolicy};
pub use error::{ImagingError, Result};
pub use filters::{
    Colormap, Contrast, Filter, ImageFilter, Lookup, Rotate, Shadow, apply_filter,
    apply_filter_dimensions, apply_filters, render_filtered, reserve_filter_margins,
};
pub use geometry::{crop, crop_point_to_size, crop_rect, crop_to_size};
pub use params::{Anchor, Interpolation, Quality, QualityProfile, Sharpening};
pub use resize::{ResizeMode, ResizeRequest, resize, scale, scale_exact};
