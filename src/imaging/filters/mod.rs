//! Composable pixel filters and canvas-growth accounting.
//!
//! | Filter | Effect | Canvas |
//! |---|---|---|
//! | [`Filter::Grayscale`] | BT.709 luminance, alpha kept | unchanged |
//! | [`Filter::Contrast`] | `gain * v + bias * 255` per channel | unchanged |
//! | [`Filter::Lookup`] | per-channel 256-entry ramp from a [`Colormap`] | unchanged |
//! | [`Filter::Shadow`] | blurred, offset silhouette behind the image | grows by offset + blur |
//! | [`Filter::Rotate`] | rotation about the center, resampled | grows to the rotated bounds |
//!
//! Filters are plain values deserialized from the `filters` array of the
//! settings file (`type = "shadow"`, ...). [`apply_filter_dimensions`] predicts
//! the final canvas of a chain and [`reserve_filter_margins`] inverts it so
//! callers can render a chain into a fixed box ([`render_filtered`]).

mod blur;
mod rotate;
mod shadow;
mod tone;

pub use rotate::Rotate;
pub use shadow::Shadow;
pub use tone::{Colormap, Contrast, Grayscale, Lookup};

use super::buffer::PixelBuffer;
use super::calculations::resolve_crop_window;
use super::error::Result;
use super::params::Anchor;
use super::resize::{ResizeRequest, resize};
use crate::config::RenderSettings;
use serde::{Deserialize, Serialize};

/// A transform from one [`PixelBuffer`] to a new one.
pub trait ImageFilter {
    fn apply(&self, buffer: &PixelBuffer, settings: &RenderSettings) -> Result<PixelBuffer>;

    /// Canvas size produced for a `width` x `height` input.
    fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (width, height)
    }

    /// Largest input whose output fits inside `width` x `height`.
    fn input_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (width, height)
    }

    /// Reject parameters that cannot produce an image.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// One step of a filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Grayscale,
    Contrast(Contrast),
    Lookup(Lookup),
    Shadow(Shadow),
    Rotate(Rotate),
}

impl Filter {
    fn as_filter(&self) -> &dyn ImageFilter {
        match self {
            Filter::Grayscale => &Grayscale,
            Filter::Contrast(f) => f,
            Filter::Lookup(f) => f,
            Filter::Shadow(f) => f,
            Filter::Rotate(f) => f,
        }
    }

    /// Short name used in logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Grayscale => "grayscale",
            Filter::Contrast(_) => "contrast",
            Filter::Lookup(_) => "lookup",
            Filter::Shadow(_) => "shadow",
            Filter::Rotate(_) => "rotate",
        }
    }
}

impl ImageFilter for Filter {
    fn apply(&self, buffer: &PixelBuffer, settings: &RenderSettings) -> Result<PixelBuffer> {
        self.as_filter().apply(buffer, settings)
    }

    fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        self.as_filter().output_dimensions(width, height)
    }

    fn input_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        self.as_filter().input_dimensions(width, height)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        self.as_filter().validate()
    }
}

/// Run a single filter.
pub fn apply_filter(
    buffer: &PixelBuffer,
    filter: &Filter,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    tracing::debug!(filter = filter.name(), "applying filter");
    filter.apply(buffer, settings)
}

/// Run the settings' filter chain in order.
#[tracing::instrument(skip_all, fields(filters = settings.filters.len()))]
pub fn apply_filters(buffer: &PixelBuffer, settings: &RenderSettings) -> Result<PixelBuffer> {
    let mut current = buffer.clone();
    for filter in &settings.filters {
        current = apply_filter(&current, filter, settings)?;
    }
    Ok(current)
}

/// Canvas size the settings' filter chain will produce for a
/// `width` x `height` input.
pub fn apply_filter_dimensions(width: u32, height: u32, settings: &RenderSettings) -> (u32, u32) {
    settings
        .filters
        .iter()
        .fold((width, height), |(w, h), f| f.output_dimensions(w, h))
}

/// Inverse of [`apply_filter_dimensions`]: the input size whose filtered
/// canvas fits inside `width` x `height`.
pub fn reserve_filter_margins(width: u32, height: u32, settings: &RenderSettings) -> (u32, u32) {
    settings
        .filters
        .iter()
        .rev()
        .fold((width, height), |(w, h), f| f.input_dimensions(w, h))
}

/// Render `buffer` through the filter chain into exactly `width` x `height`.
///
/// The source is letterboxed (settings fill, centered) into the size left
/// after reserving the chain's margins, the chain runs, and the result is
/// padded or trimmed around its center to the requested box.
pub fn render_filtered(
    buffer: &PixelBuffer,
    width: u32,
    height: u32,
    settings: &RenderSettings,
) -> Result<PixelBuffer> {
    let (inner_w, inner_h) = reserve_filter_margins(width, height, settings);
    let request = ResizeRequest::letterbox(inner_w, inner_h, settings.fill, Anchor::Center);
    let fitted = resize(buffer, &request, settings)?;
    let filtered = apply_filters(&fitted, settings)?;
    if filtered.dimensions() == (width, height) {
        return Ok(filtered);
    }
    let window = resolve_crop_window(filtered.dimensions(), (width, height), Anchor::Center);
    filtered.extract(window.x, window.y, width, height, settings.fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::color::Color;

    fn settings(filters: Vec<Filter>) -> RenderSettings {
        RenderSettings {
            filters,
            ..RenderSettings::default()
        }
    }

    fn chain() -> Vec<Filter> {
        vec![
            Filter::Grayscale,
            Filter::Shadow(Shadow::new(10, 10)),
            Filter::Rotate(Rotate::new(0.3)),
        ]
    }

    #[test]
    fn filters_deserialize_from_tagged_tables() {
        #[derive(Deserialize)]
        struct Doc {
            filters: Vec<Filter>,
        }
        let doc: Doc = toml::from_str(
            r##"
            [[filters]]
            type = "grayscale"

            [[filters]]
            type = "contrast"
            gain = 1.5
            bias = -0.1

            [[filters]]
            type = "lookup"
            colormap = ["#000000", "#ffcc88"]

            [[filters]]
            type = "shadow"
            x_offset = 4
            y_offset = -2

            [[filters]]
            type = "rotate"
            angle = 3.14159
            "##,
        )
        .unwrap();
        let names: Vec<_> = doc.filters.iter().map(Filter::name).collect();
        assert_eq!(
            names,
            ["grayscale", "contrast", "lookup", "shadow", "rotate"]
        );
        let Filter::Shadow(shadow) = &doc.filters[3] else {
            panic!("expected shadow");
        };
        assert_eq!(shadow.blur_radius, 5);
        assert_eq!(shadow.opacity, 180);
        assert_eq!(shadow.y_offset, -2);
    }

    #[test]
    fn unknown_filter_type_is_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Doc {
            filters: Vec<Filter>,
        }
        assert!(toml::from_str::<Doc>("[[filters]]\ntype = \"emboss\"").is_err());
    }

    #[test]
    fn empty_chain_is_identity() {
        let s = settings(vec![]);
        let buf = PixelBuffer::filled(7, 5, Color::RED).unwrap();
        assert_eq!(apply_filters(&buf, &s).unwrap(), buf);
        assert_eq!(apply_filter_dimensions(7, 5, &s), (7, 5));
        assert_eq!(reserve_filter_margins(7, 5, &s), (7, 5));
    }

    #[test]
    fn filter_dimensions_match_applied_chain() {
        let s = settings(chain());
        let buf = PixelBuffer::filled(60, 40, Color::RED).unwrap();
        let out = apply_filters(&buf, &s).unwrap();
        assert_eq!(out.dimensions(), apply_filter_dimensions(60, 40, &s));
    }

    #[test]
    fn filter_dimensions_are_deterministic() {
        let s = settings(chain());
        let once = apply_filter_dimensions(800, 600, &s);
        assert_eq!(once, apply_filter_dimensions(800, 600, &s));
    }

    #[test]
    fn reserved_margins_fit_inside_the_box() {
        let s = settings(chain());
        for (w, h) in [(800, 600), (100, 300), (64, 64)] {
            let (iw, ih) = reserve_filter_margins(w, h, &s);
            let (ow, oh) = apply_filter_dimensions(iw, ih, &s);
            assert!(ow <= w && oh <= h, "{w}x{h} reserved {iw}x{ih} grew to {ow}x{oh}");
        }
    }

    #[test]
    fn render_filtered_returns_requested_size() {
        let s = settings(chain());
        let buf = PixelBuffer::filled(300, 200, Color::RED).unwrap();
        let out = render_filtered(&buf, 120, 90, &s).unwrap();
        assert_eq!(out.dimensions(), (120, 90));
    }
}
