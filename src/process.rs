//! Render jobs: operation lists applied to files.
//!
//! A job is a TOML (or JSON) document listing operations in the order they
//! run, plus an optional output format:
//!
//! ```toml
//! format = "png"               # omit to keep each source's format
//!
//! [[operations]]
//! op = "resize"
//! width = 690
//! height = 219
//! anchor = "up_left"           # anchor without fill = cover
//!
//! [[operations]]
//! op = "filters"               # run the settings' filter chain
//! ```
//!
//! ## Output Structure
//!
//! Batch runs write one file per input into a flat output directory:
//!
//! ```text
//! out/
//! ├── dawn.jpg        # <stem>.<extension of the output format>
//! └── logo.png
//! ```
//!
//! ## Parallel Processing
//!
//! Files are processed in parallel using [rayon](https://docs.rs/rayon). The
//! job and settings are shared read-only across workers; each file's buffers
//! are owned by the worker rendering it.

use crate::config::{ConfigError, RenderSettings};
use crate::imaging::{
    self, Anchor, Color, FillPolicy, ImageFormat, ImagingError, PixelBuffer, ResizeRequest,
    codec,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] ImagingError),
    #[error("Settings error: {0}")]
    Config(#[from] ConfigError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot determine output format for {0}")]
    UnknownFormat(PathBuf),
    #[error("{} would overwrite the output of {}", output.display(), first.display())]
    OutputCollision { output: PathBuf, first: PathBuf },
}

fn default_mark_color() -> Color {
    Color::RED
}

/// One step of a render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Exact, fit, letterbox or cover resize.
    Resize(ResizeRequest),
    /// Multiply both dimensions by `factor`.
    Scale { factor: f64 },
    /// Cut a `width` x `height` window at `anchor`.
    Crop {
        width: u32,
        height: u32,
        #[serde(default)]
        anchor: Anchor,
    },
    /// Cut an explicit rectangle; parts outside the source take the fill.
    CropRect {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    /// Cut a rectangle and resample it to `out_width` x `out_height`.
    CropToSize {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        out_width: u32,
        out_height: u32,
        /// Padding outside the source; the settings fill when unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<FillPolicy>,
    },
    /// Center a `width` x `height` output on a point of interest.
    CropPoint {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        #[serde(default)]
        allow_scaling: bool,
    },
    /// Run the settings' filter chain.
    Filters,
    /// Run the filter chain into exactly `width` x `height`.
    RenderFiltered { width: u32, height: u32 },
    /// Draw a cross over a point.
    Mark {
        x: i64,
        y: i64,
        #[serde(default = "default_mark_color")]
        color: Color,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Resize(_) => "resize",
            Operation::Scale { .. } => "scale",
            Operation::Crop { .. } => "crop",
            Operation::CropRect { .. } => "crop_rect",
            Operation::CropToSize { .. } => "crop_to_size",
            Operation::CropPoint { .. } => "crop_point",
            Operation::Filters => "filters",
            Operation::RenderFiltered { .. } => "render_filtered",
            Operation::Mark { .. } => "mark",
        }
    }

    /// Run this operation, consuming the previous step's buffer.
    pub fn apply(
        &self,
        buffer: PixelBuffer,
        settings: &RenderSettings,
    ) -> imaging::Result<PixelBuffer> {
        match *self {
            Operation::Resize(ref request) => imaging::resize(&buffer, request, settings),
            Operation::Scale { factor } => imaging::scale(&buffer, factor, settings),
            Operation::Crop {
                width,
                height,
                anchor,
            } => imaging::crop(&buffer, width, height, anchor, settings),
            Operation::CropRect {
                x,
                y,
                width,
                height,
            } => imaging::crop_rect(&buffer, x, y, width, height, settings),
            Operation::CropToSize {
                x,
                y,
                width,
                height,
                out_width,
                out_height,
                fill,
            } => imaging::crop_to_size(
                &buffer, x, y, width, height, out_width, out_height, fill, settings,
            ),
            Operation::CropPoint {
                x,
                y,
                width,
                height,
                allow_scaling,
            } => imaging::crop_point_to_size(&buffer, x, y, allow_scaling, width, height, settings),
            Operation::Filters => imaging::apply_filters(&buffer, settings),
            Operation::RenderFiltered { width, height } => {
                imaging::render_filtered(&buffer, width, height, settings)
            }
            Operation::Mark { x, y, color } => {
                let mut buffer = buffer;
                buffer.mark_point(x, y, color);
                Ok(buffer)
            }
        }
    }
}

/// Run `operations` in order.
pub fn apply_operations(
    buffer: PixelBuffer,
    operations: &[Operation],
    settings: &RenderSettings,
) -> imaging::Result<PixelBuffer> {
    operations.iter().try_fold(buffer, |current, op| {
        tracing::debug!(op = op.name(), "applying operation");
        op.apply(current, settings)
    })
}

/// An operation list plus the output format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderJob {
    pub operations: Vec<Operation>,
    /// Output format; the source format when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
}

impl RenderJob {
    /// Load a job file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ProcessError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            toml::from_str(&content).map_err(|e| ProcessError::Config(ConfigError::Toml(e)))
        }
    }
}

/// Result of rendering one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedImage {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// A file the batch could not render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedImage {
    pub source: PathBuf,
    pub error: String,
}

/// Everything a batch run produced, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedImage>,
    pub failed: Vec<FailedImage>,
}

/// Decode `input`, run `job`, and write the result to `output`.
///
/// The output format is, in order: the job's format, the output path's
/// extension, the source's format. An unrecognized extension is an error.
pub fn render_file(
    input: &Path,
    output: &Path,
    job: &RenderJob,
    settings: &RenderSettings,
) -> Result<ProcessedImage, ProcessError> {
    let bytes = std::fs::read(input)?;
    let format = match (job.format, output.extension()) {
        (Some(format), _) => format,
        (None, Some(_)) => ImageFormat::from_path(output)
            .ok_or_else(|| ProcessError::UnknownFormat(output.to_path_buf()))?,
        (None, None) => ImageFormat::sniff(&bytes)?,
    };
    render_bytes(input, &bytes, output, format, &job.operations, settings)
}

fn render_bytes(
    input: &Path,
    bytes: &[u8],
    output: &Path,
    format: ImageFormat,
    operations: &[Operation],
    settings: &RenderSettings,
) -> Result<ProcessedImage, ProcessError> {
    let buffer = codec::decode(bytes)?;
    let rendered = apply_operations(buffer, operations, settings)?;
    codec::write(&rendered, output, format, settings)?;

    info!(
        source = %input.display(),
        output = %output.display(),
        width = rendered.width(),
        height = rendered.height(),
        "rendered"
    );
    Ok(ProcessedImage {
        source: input.to_path_buf(),
        output: output.to_path_buf(),
        format,
        width: rendered.width(),
        height: rendered.height(),
    })
}

/// Output path for `input` inside `output_dir`: `<stem>.<ext>`.
pub fn output_path(
    input: &Path,
    output_dir: &Path,
    format: ImageFormat,
) -> Result<PathBuf, ProcessError> {
    let stem = input.file_stem().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no file name in {}", input.display()),
        )
    })?;
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(format.extension());
    Ok(output_dir.join(name))
}

/// A source read into memory with its destination decided.
struct PlannedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    output: PathBuf,
}

fn plan(input: &Path, output_dir: &Path, job: &RenderJob) -> Result<PlannedImage, ProcessError> {
    let bytes = std::fs::read(input)?;
    let format = match job.format {
        Some(format) => format,
        None => ImageFormat::sniff(&bytes)?,
    };
    let output = output_path(input, output_dir, format)?;
    Ok(PlannedImage {
        bytes,
        format,
        output,
    })
}

/// Render one file into `output_dir`.
pub fn process_file(
    input: &Path,
    output_dir: &Path,
    job: &RenderJob,
    settings: &RenderSettings,
) -> Result<ProcessedImage, ProcessError> {
    let planned = plan(input, output_dir, job)?;
    render_bytes(
        input,
        &planned.bytes,
        &planned.output,
        planned.format,
        &job.operations,
        settings,
    )
}

/// Render every input into `output_dir` in parallel.
///
/// Failures are collected per file rather than aborting the batch. When two
/// inputs map to the same output file (`a.png` and `a.jpg` rendered as PNG),
/// the first in input order is rendered and the others fail.
#[tracing::instrument(skip_all, fields(inputs = inputs.len(), output = %output_dir.display()))]
pub fn process_files(
    inputs: &[PathBuf],
    output_dir: &Path,
    job: &RenderJob,
    settings: &RenderSettings,
) -> Result<BatchReport, ProcessError> {
    std::fs::create_dir_all(output_dir)?;

    let planned: Vec<_> = inputs
        .par_iter()
        .map(|input| (input, plan(input, output_dir, job)))
        .collect();

    let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
    let planned: Vec<_> = planned
        .into_iter()
        .map(|(input, result)| {
            let result = result.and_then(|planned| match claimed.get(&planned.output) {
                Some(first) => Err(ProcessError::OutputCollision {
                    output: planned.output,
                    first: first.to_path_buf(),
                }),
                None => {
                    claimed.insert(planned.output.clone(), input);
                    Ok(planned)
                }
            });
            (input, result)
        })
        .collect();

    let results: Vec<_> = planned
        .into_par_iter()
        .map(|(input, result)| {
            let rendered = result.and_then(|planned| {
                render_bytes(
                    input,
                    &planned.bytes,
                    &planned.output,
                    planned.format,
                    &job.operations,
                    settings,
                )
            });
            (input, rendered)
        })
        .collect();

    let mut report = BatchReport::default();
    for (input, result) in results {
        match result {
            Ok(image) => report.processed.push(image),
            Err(e) => {
                warn!(source = %input.display(), error = %e, "failed to render");
                report.failed.push(FailedImage {
                    source: input.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        "batch complete"
    );
    Ok(report)
}
