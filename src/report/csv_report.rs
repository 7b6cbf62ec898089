// src/report/csv_report.rs

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::core::models::{CheckKind, RunReport, SiteRecord};
use crate::error::ReportError;

/// One flattened row per site. Cells for kinds that did not run stay empty.
#[derive(Debug, Default, Serialize)]
pub struct CsvRow {
    pub timestamp_iso: String,
    pub name: String,
    pub url: String,

    pub http_ok: Option<bool>,
    pub http_status: Option<u16>,
    pub http_latency_ms: Option<u64>,
    pub http_keyword_matched: Option<bool>,
    pub http_error: Option<String>,

    pub ssl_ok: Option<bool>,
    pub ssl_days_to_expiry: Option<i64>,
    pub ssl_not_after: Option<String>,
    pub ssl_issuer: Option<String>,
    pub ssl_error: Option<String>,

    pub headers_ok: Option<bool>,
    pub headers_grade: Option<String>,
    pub headers_issues_count: Option<usize>,
    pub headers_error: Option<String>,

    pub dns_ok: Option<bool>,
    pub dns_a_count: Option<usize>,
    pub dns_aaaa_count: Option<usize>,
    pub dns_cname_count: Option<usize>,
    pub dns_mx_count: Option<usize>,
    pub dns_fingerprint: Option<String>,
    pub dns_error: Option<String>,
}

impl CsvRow {
    pub fn from_site(timestamp_iso: &str, site: &SiteRecord) -> Self {
        let mut row = CsvRow {
            timestamp_iso: timestamp_iso.to_string(),
            name: site.name.clone(),
            url: site.url.clone(),
            ..Default::default()
        };

        if let Some(r) = site.result(CheckKind::Http) {
            row.http_ok = Some(r.ok);
            row.http_error = r.error.clone();
            if let Some(http) = r.http() {
                row.http_status = http.status_code;
                row.http_latency_ms = http.latency_ms;
                row.http_keyword_matched = http.keyword_matched;
            }
        }

        if let Some(r) = site.result(CheckKind::Ssl) {
            row.ssl_ok = Some(r.ok);
            row.ssl_error = r.error.clone();
            if let Some(ssl) = r.ssl() {
                row.ssl_days_to_expiry = Some(ssl.days_to_expiry);
                row.ssl_not_after = Some(ssl.not_after.clone());
                row.ssl_issuer = Some(ssl.issuer.clone());
            }
        }

        if let Some(r) = site.result(CheckKind::Headers) {
            row.headers_ok = Some(r.ok);
            row.headers_error = r.error.clone();
            if let Some(h) = r.headers() {
                row.headers_grade = Some(h.grade.to_string());
                row.headers_issues_count = Some(h.issues.len());
            }
        }

        if let Some(r) = site.result(CheckKind::Dns) {
            row.dns_ok = Some(r.ok);
            row.dns_error = r.error.clone();
            if let Some(dns) = r.dns() {
                let count = |t: &str| Some(dns.records.get(t).map_or(0, Vec::len));
                row.dns_a_count = count("A");
                row.dns_aaaa_count = count("AAAA");
                row.dns_cname_count = count("CNAME");
                row.dns_mx_count = count("MX");
                row.dns_fingerprint = Some(dns.fingerprint.clone());
            }
        }
        row
    }
}

pub fn rows(report: &RunReport) -> Vec<CsvRow> {
    let timestamp = report
        .generated_at
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    report
        .sites
        .iter()
        .map(|site| CsvRow::from_site(&timestamp, site))
        .collect()
}

pub fn write_csv(report: &RunReport, path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows(report) {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), sites = report.sites.len(), "CSV report written.");
    Ok(())
}
