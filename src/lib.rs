//! # Rendition
//!
//! An image transformation engine: decode JPEG, PNG and GIF into one
//! in-memory pixel model, crop, resize, filter, and encode back out.
//!
//! # Architecture: Decode → Operate → Encode
//!
//! ```text
//! 1. Decode    bytes   →  PixelBuffer     (RGB / RGBA / indexed, CMYK JPEG converted)
//! 2. Operate   buffer  →  buffer          (crop, resize, filters; each returns a new buffer)
//! 3. Encode    buffer  →  bytes           (alpha flattened or quantized as the format needs)
//! ```
//!
//! Every operation is a function of its input buffer and a shared
//! [`config::RenderSettings`]: there is no global state, so one settings value
//! can serve any number of threads rendering different images.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel model, codecs, geometry, resizing and the filter pipeline |
//! | [`config`] | `settings.toml` loading, merging over stock defaults, validation |
//! | [`process`] | Render jobs (operation lists) applied to files, parallel batches |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Resample Per Operation
//!
//! Crop-then-scale operations ([`imaging::crop_to_size`], cover resizing) pick
//! the source window first and resample it once, straight into the output
//! size. Large reductions halve with a box filter before the final kernel,
//! which keeps Catmull-Rom from aliasing on 10x downscales.
//!
//! ## Premultiplied Alpha
//!
//! Resampling and rotation run on premultiplied samples, so fully transparent
//! pixels (whose color is arbitrary) never bleed into visible edges.
//!
//! ## Indexed Images Stay Indexed
//!
//! A GIF that is only cropped keeps its palette and transparent index. Any
//! operation that has to invent colors (resampling, blending a colored fill)
//! produces RGBA, and the GIF encoder quantizes back down on the way out.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
