//! Error types for the parts of quickshield that can fail as a whole.
//!
//! Individual checks never return these: a failed check is a `CheckResult` with `ok: false`.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Refusing to overwrite existing {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Config has {} issue(s)", .0.len())]
    Invalid(Vec<String>),
}

/// Report writing errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures setting up the engine itself, before any check runs.
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
