//! CLI output formatting.
//!
//! Each source is shown by its positional index and file name, with paths
//! and canvas details as indented context lines.
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! 001 IMG_0042.jpg → photosphere-streetview-IMG_0042/
//!     Source: photos/IMG_0042.jpg
//!     Canvas: 6000x3000 (padded)
//! 002 broken.png failed
//!     Source: photos/broken.png
//!     Error: could not convert image to street view format: ...
//!
//! Converted 1 image, 1 failed
//! Cache: 1 padded
//! ```
//!
//! ## Inspect
//!
//! ```text
//! IMG_0042.jpg (4000x3000)
//!     FullWidth: 6000
//!     FullHeight: 3000
//!     CroppedWidth: 4000
//!     CroppedHeight: 3000
//!     CroppedLeft: 1000
//!     CroppedTop: 0
//!     Padding: left 1000, right 1000, top 0, bottom 0
//! ```
//!
//! Format functions return `Vec<String>` and do no I/O; `print_*` wrappers
//! write them to stdout.

use crate::pano::PanoOpts;
use crate::process::{ImageStatus, Inspection, ProcessEvent, ProcessResult};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn status_label(status: ImageStatus) -> &'static str {
    match status {
        ImageStatus::Cached => "cached",
        ImageStatus::Copied => "copied",
        ImageStatus::Padded => "padded",
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// The six canvas fields, one per line, under their wire names.
pub fn format_pano_fields(pano: &PanoOpts, indent: &str) -> Vec<String> {
    [
        ("FullWidth", pano.full_width),
        ("FullHeight", pano.full_height),
        ("CroppedWidth", pano.cropped_width),
        ("CroppedHeight", pano.cropped_height),
        ("CroppedLeft", pano.cropped_left),
        ("CroppedTop", pano.cropped_top),
    ]
    .iter()
    .map(|(name, value)| format!("{indent}{name}: {value}"))
    .collect()
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Converted {
            index,
            source,
            bundle_dir,
            pano,
            status,
        } => vec![
            format!(
                "{} {} → {}/",
                format_index(*index),
                file_name(source),
                file_name(bundle_dir)
            ),
            format!("    Source: {}", source.display()),
            format!(
                "    Canvas: {}x{} ({})",
                pano.full_width,
                pano.full_height,
                status_label(*status)
            ),
        ],
        ProcessEvent::Failed {
            index,
            source,
            message,
            ..
        } => vec![
            format!("{} {} failed", format_index(*index), file_name(source)),
            format!("    Source: {}", source.display()),
            format!("    Error: {message}"),
        ],
    }
}

/// Closing summary for a convert run.
pub fn format_convert_summary(result: &ProcessResult) -> Vec<String> {
    let mut lines = vec![String::new()];
    let converted = plural(result.converted.len(), "image");
    if result.failed.is_empty() {
        lines.push(format!("Converted {converted}"));
    } else {
        lines.push(format!(
            "Converted {converted}, {} failed",
            result.failed.len()
        ));
    }
    lines.push(format!("Cache: {}", result.cache_stats));
    lines
}

/// Geometry preview for `inspect`.
pub fn format_inspection(report: &Inspection) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}x{})",
        file_name(&report.source),
        report.width,
        report.height
    )];
    lines.extend(format_pano_fields(&report.pano, "    "));
    let pano = &report.pano;
    if pano.is_identity() {
        lines.push("    Already 2:1, no padding needed".to_string());
    } else {
        lines.push(format!(
            "    Padding: left {}, right {}, top {}, bottom {}",
            pano.cropped_left,
            pano.padding_right(),
            pano.cropped_top,
            pano.padding_bottom()
        ));
    }
    lines
}

pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

pub fn print_convert_summary(result: &ProcessResult) {
    for line in format_convert_summary(result) {
        println!("{}", line);
    }
}

pub fn print_inspection(report: &Inspection) {
    for line in format_inspection(report) {
        println!("{}", line);
    }
}
