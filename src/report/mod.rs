//! Report encoders. Each takes a finished `RunReport` and writes one file into the output
//! directory, named `checks-<timestamp>.<ext>` after the run's `generated_at`.

pub mod csv_report;
pub mod json_report;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::models::RunReport;
use crate::error::ReportError;

pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// `output/checks-20250101-120000.json` style path for a report.
pub fn report_path(dir: &Path, report: &RunReport, extension: &str) -> PathBuf {
    let stamp = report.generated_at.format("%Y%m%d-%H%M%S");
    dir.join(format!("checks-{}.{}", stamp, extension))
}

/// Writes every file the report's format asks for and returns their paths.
pub fn write_reports(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    if report.format.wants_json() {
        let path = report_path(dir, report, "json");
        json_report::write_json(report, &path)?;
        written.push(path);
    }
    if report.format.wants_csv() {
        let path = report_path(dir, report, "csv");
        csv_report::write_csv(report, &path)?;
        written.push(path);
    }
    info!(files = written.len(), dir = %dir.display(), "Reports written.");
    Ok(written)
}
