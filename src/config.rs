//! Render settings module.
//!
//! Handles loading, validating, and merging settings files. Settings are
//! layered: stock defaults, then a user `settings.toml`, then command-line
//! overrides, each layer overriding only the keys it names.
//!
//! ## Settings Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! profile = "quality"          # speed | quality | quality-bicubic | quality-soft
//! compression_quality = 0.8    # JPEG quality, 0.0-1.0
//! fill = "transparent"         # or "#rrggbb" / "#rrggbbaa"
//! maximum_blur_size = 6250000  # pixel-area ceiling for sharpen/blur passes
//!
//! [[filters]]                  # applied in order by `--filters`
//! type = "shadow"
//! x_offset = 10
//! y_offset = 10
//! ```
//!
//! ## Partial Settings
//!
//! Settings files are sparse. Override just the values you want:
//!
//! ```toml
//! fill = "#ffffff"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Filter, FillPolicy, ImageFilter, QualityProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Default pixel-area ceiling for sharpening and blur passes.
pub const DEFAULT_MAXIMUM_BLUR_SIZE: u64 = 2500 * 2500;

/// Everything an operation needs to know about *how* to render.
///
/// Created once per rendering session and passed by reference into every
/// operation. All fields have defaults; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    /// Speed/quality trade-off: resampling kernel and sharpening.
    pub profile: QualityProfile,
    /// JPEG quality in `[0.0, 1.0]`.
    pub compression_quality: f32,
    /// Color for margins and uncovered areas, or transparent.
    pub fill: FillPolicy,
    /// Largest pixel area that still gets sharpened or blurred.
    pub maximum_blur_size: u64,
    /// Filter chain run by `apply_filters`.
    pub filters: Vec<Filter>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            profile: QualityProfile::default(),
            compression_quality: 0.8,
            fill: FillPolicy::Transparent,
            maximum_blur_size: DEFAULT_MAXIMUM_BLUR_SIZE,
            filters: Vec::new(),
        }
    }
}

impl RenderSettings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.compression_quality) {
            return Err(ConfigError::Validation(format!(
                "compression_quality must be 0.0-1.0, got {}",
                self.compression_quality
            )));
        }
        if self.maximum_blur_size == 0 {
            return Err(ConfigError::Validation(
                "maximum_blur_size must be non-zero".into(),
            ));
        }
        for (i, filter) in self.filters.iter().enumerate() {
            filter.validate().map_err(|msg| {
                ConfigError::Validation(format!("filters[{i}] ({}): {msg}", filter.name()))
            })?;
        }
        Ok(())
    }
}

/// Resolve the worker count for batch processing.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Settings loading, merging, and validation
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RenderSettings::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a
///   `filters` array in an overlay replaces the whole chain.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a settings file as a raw TOML value.
pub fn load_raw_settings(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<RenderSettings, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let settings: RenderSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file, merged on top of stock defaults.
pub fn load_settings(path: &Path) -> Result<RenderSettings, ConfigError> {
    let overlay = load_raw_settings(path)?;
    resolve_settings(stock_defaults_value()?, [overlay])
}

/// Returns a fully-commented stock settings file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_settings_toml() -> &'static str {
    r##"# Rendition Settings
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass with `--config settings.toml`. Command-line flags override this file.
# Unknown keys will cause an error.

# Speed/quality trade-off for resampling:
#   speed            nearest neighbour, no sharpening
#   quality          Catmull-Rom bicubic, light sharpening after downscale
#   quality-bicubic  Catmull-Rom bicubic, stronger sharpening
#   quality-soft     bilinear, gentle sharpening
profile = "quality"

# JPEG encoding quality (0.0 = smallest file, 1.0 = best).
compression_quality = 0.8

# Color for letterbox margins, padded crops, rotated corners and JPEG
# backgrounds: "transparent" or a hex color ("#rrggbb" / "#rrggbbaa").
fill = "transparent"

# Largest image area (in pixels) that still gets sharpened after downscaling
# or blurred by the shadow filter. Larger shadows fail instead of stalling.
maximum_blur_size = 6250000

# ---------------------------------------------------------------------------
# Filter chain, applied in order with `render --filters`
# ---------------------------------------------------------------------------
# [[filters]]
# type = "grayscale"
#
# [[filters]]
# type = "contrast"
# gain = 1.2                  # multiplier per channel
# bias = 0.0                  # added as a fraction of 255
#
# [[filters]]
# type = "lookup"
# colormap = ["#000000", "#fff0c0"]   # 2+ stops, evenly spaced
#
# [[filters]]
# type = "shadow"
# x_offset = 10
# y_offset = 10
# opacity = 180               # 0-255
# color = "#000000"
# blur_radius = 5
# background = "#ffffff"      # omit to use `fill`
#
# [[filters]]
# type = "rotate"
# angle = 0.5                 # radians, clockwise
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Color, Shadow};
    use tempfile::TempDir;

    #[test]
    fn default_settings() {
        let settings = RenderSettings::default();
        assert_eq!(settings.profile, QualityProfile::Quality);
        assert_eq!(settings.compression_quality, 0.8);
        assert_eq!(settings.fill, FillPolicy::Transparent);
        assert_eq!(settings.maximum_blur_size, 6_250_000);
        assert!(settings.filters.is_empty());
    }

    #[test]
    fn parse_partial_settings() {
        let settings: RenderSettings = toml::from_str(
            r##"
fill = "#ffffff"
profile = "quality-soft"
"##,
        )
        .unwrap();
        assert_eq!(settings.fill, FillPolicy::Color(Color::WHITE));
        assert_eq!(settings.profile, QualityProfile::QualitySoft);
        // Default values preserved
        assert_eq!(settings.compression_quality, 0.8);
    }

    #[test]
    fn parse_filter_chain() {
        let settings: RenderSettings = toml::from_str(
            r#"
[[filters]]
type = "shadow"
x_offset = 10
y_offset = 10

[[filters]]
type = "grayscale"
"#,
        )
        .unwrap();
        assert_eq!(
            settings.filters,
            vec![Filter::Shadow(Shadow::new(10, 10)), Filter::Grayscale]
        );
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: RenderSettings = toml::from_str(stock_settings_toml()).unwrap();
        assert_eq!(parsed, RenderSettings::default());
    }

    #[test]
    fn stock_defaults_roundtrip() {
        let value = stock_defaults_value().unwrap();
        let settings = resolve_settings(value, []).unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn compression_quality_out_of_range() {
        let settings = RenderSettings {
            compression_quality: 1.5,
            ..RenderSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn zero_blur_ceiling_rejected() {
        let settings = RenderSettings {
            maximum_blur_size: 0,
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_filter_is_reported_with_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(
            &path,
            r#"
[[filters]]
type = "grayscale"

[[filters]]
type = "rotate"
angle = nan
"#,
        )
        .unwrap();
        let err = load_settings(&path).unwrap_err().to_string();
        assert!(err.contains("filters[1]"), "got {err}");
        assert!(err.contains("rotate"), "got {err}");
    }

    #[test]
    fn oversized_shadow_rejected_at_load() {
        let settings: RenderSettings = toml::from_str(
            r#"
[[filters]]
type = "shadow"
blur_radius = 3000000000
"#,
        )
        .unwrap();
        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("filters[0] (shadow)"), "got {err}");
        assert!(err.contains("blur_radius"), "got {err}");
    }

    #[test]
    fn colormap_with_one_stop_rejected() {
        let result: Result<RenderSettings, _> = toml::from_str(
            r##"
[[filters]]
type = "lookup"
colormap = ["#000000"]
"##,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // load_settings tests
    // =========================================================================

    #[test]
    fn load_settings_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "compression_quality = 0.3\nfill = \"#000\"\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.compression_quality, 0.3);
        assert_eq!(settings.fill, FillPolicy::Color(Color::BLACK));
        assert_eq!(settings.profile, QualityProfile::Quality);
    }

    #[test]
    fn load_settings_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_settings(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_settings_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_settings(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn cli_overlay_wins_over_file() {
        let file: toml::Value = toml::from_str("fill = \"#ff0000\"\nprofile = \"speed\"").unwrap();
        let cli: toml::Value = toml::from_str("fill = \"transparent\"").unwrap();
        let settings = resolve_settings(stock_defaults_value().unwrap(), [file, cli]).unwrap();
        assert_eq!(settings.fill, FillPolicy::Transparent);
        assert_eq!(settings.profile, QualityProfile::Speed);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"compression_quality = 0.8"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"compression_quality = 0.3"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(
            merged.get("compression_quality").unwrap().as_float(),
            Some(0.3)
        );
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str(r#"a = 10"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_replaces_arrays() {
        let base: toml::Value = toml::from_str(
            r#"
[[filters]]
type = "grayscale"

[[filters]]
type = "rotate"
angle = 1.0
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[[filters]]
type = "contrast"
gain = 2.0
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let filters = merged.get("filters").unwrap().as_array().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].get("type").unwrap().as_str(), Some("contrast"));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<RenderSettings, _> = toml::from_str("qualty = 0.9");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_filter_field_rejected() {
        let result: Result<RenderSettings, _> = toml::from_str(
            r#"
[[filters]]
type = "shadow"
x_ofset = 3
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let cores = effective_threads(None);
        assert!(cores >= 1);
        assert_eq!(effective_threads(Some(1)), 1);
        assert_eq!(effective_threads(Some(usize::MAX)), cores);
    }
}
