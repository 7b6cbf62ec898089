// src/core/mod.rs

/// Result model: check kinds, per-check results, site records and the run report.
pub mod models;

/// Header policy and grading thresholds consulted by the headers scanner, plus the
/// optional expiry classification for TLS results.
pub mod policy;

/// The check engine: one scanner per check kind, plus the per-site orchestrator and the
/// run aggregator.
pub mod scanner;
