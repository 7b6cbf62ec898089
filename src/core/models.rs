// src/core/models.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

// --- Check Kinds ---

/// The four independent probe types. Declaration order is the canonical order used
/// when the selection is empty.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CheckKind {
    Http,
    Ssl,
    Headers,
    Dns,
}

impl CheckKind {
    /// Every kind, in canonical order.
    pub fn all() -> Vec<CheckKind> {
        CheckKind::iter().collect()
    }

    /// Whether this kind runs against the given URL at all. TLS only makes sense on
    /// `https`; everything else applies to any scheme.
    pub fn applies_to(&self, url: &Url) -> bool {
        match self {
            CheckKind::Ssl => url.scheme() == "https",
            _ => true,
        }
    }
}

// --- Grades ---

/// Letter grade for the headers check. Variants are ordered best-first, so
/// `Grade::A < Grade::F` and "worse" means "greater".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

// --- Per-kind payloads ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HttpDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Only set when the site configures `expect_keyword`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_matched: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SslDetails {
    pub host: String,
    pub port: u16,
    /// Whole days until `not_after`, floored. Negative once the certificate has expired.
    pub days_to_expiry: i64,
    /// RFC 3339, UTC.
    pub not_after: String,
    pub issuer: String,
    /// Whether the chain passed platform verification on the first handshake.
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadersDetails {
    pub grade: Grade,
    pub issues: Vec<String>,
    /// Observed value of every policy header, empty when absent.
    pub sample: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsDetails {
    /// Record type name (`A`, `AAAA`, `CNAME`, `MX`) to sorted values.
    pub records: BTreeMap<String, Vec<String>>,
    pub fingerprint: String,
}

/// Kind-specific payload of a `CheckResult`. Serialized untagged so the fields sit next to
/// the common ones in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CheckDetails {
    Http(HttpDetails),
    Ssl(SslDetails),
    Headers(HeadersDetails),
    Dns(DnsDetails),
}

impl CheckDetails {
    pub fn kind(&self) -> CheckKind {
        match self {
            CheckDetails::Http(_) => CheckKind::Http,
            CheckDetails::Ssl(_) => CheckKind::Ssl,
            CheckDetails::Headers(_) => CheckKind::Headers,
            CheckDetails::Dns(_) => CheckKind::Dns,
        }
    }
}

// --- Check Result ---

/// Outcome of one check against one site. `error` is set exactly when `ok` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub details: Option<CheckDetails>,
}

impl CheckResult {
    pub fn success(details: CheckDetails, duration_ms: u64) -> Self {
        Self {
            kind: details.kind(),
            ok: true,
            error: None,
            duration_ms,
            details: Some(details),
        }
    }

    /// A hard failure with no payload.
    pub fn failure(kind: CheckKind, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind,
            ok: false,
            error: Some(error.into()),
            duration_ms,
            details: None,
        }
    }

    /// A failure that still carries whatever was measured before it (e.g. the HTTP status
    /// when the expected keyword is missing).
    pub fn failure_with(details: CheckDetails, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind: details.kind(),
            ok: false,
            error: Some(error.into()),
            duration_ms,
            details: Some(details),
        }
    }

    pub fn http(&self) -> Option<&HttpDetails> {
        match &self.details {
            Some(CheckDetails::Http(d)) => Some(d),
            _ => None,
        }
    }

    pub fn ssl(&self) -> Option<&SslDetails> {
        match &self.details {
            Some(CheckDetails::Ssl(d)) => Some(d),
            _ => None,
        }
    }

    pub fn headers(&self) -> Option<&HeadersDetails> {
        match &self.details {
            Some(CheckDetails::Headers(d)) => Some(d),
            _ => None,
        }
    }

    pub fn dns(&self) -> Option<&DnsDetails> {
        match &self.details {
            Some(CheckDetails::Dns(d)) => Some(d),
            _ => None,
        }
    }
}

// --- Sites ---

/// A validated site entry handed to the engine by the config layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSpec {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub expect_keyword: Option<String>,
}

/// One result per selected, applicable kind, in selection order.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRecord {
    pub name: String,
    pub url: String,
    pub results: Vec<CheckResult>,
}

impl SiteRecord {
    pub fn result(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.kind == kind)
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }
}

// --- Run Report ---

/// Output format requested for a run; carried on the report for the encoders.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
    Both,
}

impl ReportFormat {
    pub fn wants_json(&self) -> bool {
        matches!(self, ReportFormat::Json | ReportFormat::Both)
    }

    pub fn wants_csv(&self) -> bool {
        matches!(self, ReportFormat::Csv | ReportFormat::Both)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub format: ReportFormat,
    pub selected_kinds: Vec<CheckKind>,
    pub sites: Vec<SiteRecord>,
}

impl RunReport {
    pub fn failed_checks(&self) -> usize {
        self.sites
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| !r.ok)
            .count()
    }
}

// --- Kind Selection ---

/// Raised when an `--only` token names no known check kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCheckKind(pub String);

impl fmt::Display for UnknownCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown check kind '{}' (expected one of: {})",
            self.0,
            CheckKind::all()
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for UnknownCheckKind {}

/// Parses a comma separated selection such as `"http,DNS"`. Duplicates collapse onto the
/// first occurrence; an empty or blank selection means every kind.
pub fn parse_selection(raw: &str) -> Result<Vec<CheckKind>, UnknownCheckKind> {
    let mut kinds = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let kind: CheckKind = token
            .parse()
            .map_err(|_| UnknownCheckKind(token.to_string()))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(normalize_selection(kinds))
}

/// Dedups a selection, preserving first occurrence, and expands an empty one to all kinds.
pub fn normalize_selection(kinds: impl IntoIterator<Item = CheckKind>) -> Vec<CheckKind> {
    let mut out: Vec<CheckKind> = Vec::new();
    for kind in kinds {
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    if out.is_empty() { CheckKind::all() } else { out }
}
