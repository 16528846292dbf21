//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! photo.jpg
//!     jpeg 2272x1704 rgb
//! logo.gif
//!     gif 150x55 indexed, alpha
//! ```
//!
//! ## Render
//!
//! ```text
//! photo.jpg → thumb.png
//!     png 690x219
//! ```
//!
//! ## Batch
//!
//! ```text
//! a.jpg → out/a.png (png 120x90)
//! b.gif → out/b.png (png 120x44)
//! broken.png
//!     Error: Decode error: ...
//!
//! Rendered 2 images, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::ImageInfo;
use crate::process::{BatchReport, ProcessedImage};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `"1 image"` / `"3 images"`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn summary(info: &ImageInfo) -> String {
    let alpha = if info.has_alpha { ", alpha" } else { "" };
    format!(
        "{} {}x{} {}{}",
        info.format, info.width, info.height, info.color_model, alpha
    )
}

// ============================================================================
// Info
// ============================================================================

/// Format `info` output for one file.
pub fn format_info(path: &Path, info: &ImageInfo) -> Vec<String> {
    vec![
        path.display().to_string(),
        format!("{}{}", indent(1), summary(info)),
    ]
}

pub fn print_info(path: &Path, info: &ImageInfo) {
    for line in format_info(path, info) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

/// Format the result of a single `render`.
pub fn format_processed(image: &ProcessedImage) -> Vec<String> {
    vec![
        format!("{} → {}", image.source.display(), image.output.display()),
        format!(
            "{}{} {}x{}",
            indent(1),
            image.format,
            image.width,
            image.height
        ),
    ]
}

pub fn print_processed(image: &ProcessedImage) {
    for line in format_processed(image) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a batch report: one line per rendered file, an indented error per
/// failure, and a closing summary.
pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    for image in &report.processed {
        lines.push(format!(
            "{} → {} ({} {}x{})",
            image.source.display(),
            image.output.display(),
            image.format,
            image.width,
            image.height
        ));
    }
    for failed in &report.failed {
        lines.push(failed.source.display().to_string());
        lines.push(format!("{}Error: {}", indent(1), failed.error));
    }

    lines.push(String::new());
    let mut total = format!("Rendered {}", plural(report.processed.len(), "image"));
    if !report.failed.is_empty() {
        total.push_str(&format!(", {} failed", report.failed.len()));
    }
    lines.push(total);
    lines
}

pub fn print_batch_report(report: &BatchReport) {
    for line in format_batch_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{ImageFormat, PixelFormat};
    use crate::process::FailedImage;
    use std::path::PathBuf;

    fn processed(name: &str, w: u32, h: u32) -> ProcessedImage {
        ProcessedImage {
            source: PathBuf::from(format!("{name}.jpg")),
            output: PathBuf::from(format!("out/{name}.png")),
            format: ImageFormat::Png,
            width: w,
            height: h,
        }
    }

    #[test]
    fn info_shows_format_size_and_model() {
        let info = ImageInfo {
            format: ImageFormat::Gif,
            width: 150,
            height: 55,
            color_model: PixelFormat::Indexed,
            has_alpha: true,
        };
        let lines = format_info(Path::new("logo.gif"), &info);
        assert_eq!(lines, vec!["logo.gif", "    gif 150x55 indexed, alpha"]);
    }

    #[test]
    fn info_omits_alpha_for_opaque_images() {
        let info = ImageInfo {
            format: ImageFormat::Jpeg,
            width: 2272,
            height: 1704,
            color_model: PixelFormat::Rgb,
            has_alpha: false,
        };
        let lines = format_info(Path::new("photo.jpg"), &info);
        assert_eq!(lines[1], "    jpeg 2272x1704 rgb");
    }

    #[test]
    fn processed_shows_source_output_and_size() {
        let lines = format_processed(&processed("photo", 690, 219));
        assert_eq!(lines, vec!["photo.jpg → out/photo.png", "    png 690x219"]);
    }

    #[test]
    fn batch_report_lists_files_and_summary() {
        let report = BatchReport {
            processed: vec![processed("a", 120, 90), processed("b", 120, 44)],
            failed: vec![],
        };
        let lines = format_batch_report(&report);
        assert_eq!(lines[0], "a.jpg → out/a.png (png 120x90)");
        assert_eq!(lines[1], "b.jpg → out/b.png (png 120x44)");
        assert_eq!(lines.last().unwrap(), "Rendered 2 images");
    }

    #[test]
    fn batch_report_shows_failures() {
        let report = BatchReport {
            processed: vec![processed("a", 10, 10)],
            failed: vec![FailedImage {
                source: PathBuf::from("broken.png"),
                error: "Decode error: bad header".into(),
            }],
        };
        let lines = format_batch_report(&report);
        assert!(lines.contains(&"broken.png".to_string()));
        assert!(lines.contains(&"    Error: Decode error: bad header".to_string()));
        assert_eq!(lines.last().unwrap(), "Rendered 1 image, 1 failed");
    }
}
