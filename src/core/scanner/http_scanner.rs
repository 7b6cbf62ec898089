// src/core/scanner/http_scanner.rs

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::core::models::{CheckDetails, CheckKind, CheckResult, HttpDetails};

/// Fetches `url` with a GET and reports status and latency.
///
/// Any HTTP status counts as reachable: `ok` only reflects whether the transport succeeded
/// and, when `expect_keyword` is set, whether the decoded body contains it verbatim
/// (case-sensitive). Latency runs from sending the request to receiving the full body.
pub async fn run_http_scan(
    client: &Client,
    url: &str,
    expect_keyword: Option<&str>,
    timeout: Duration,
) -> CheckResult {
    info!(url, "Starting HTTP check.");
    let start = Instant::now();

    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            let elapsed = elapsed_ms(start);
            let message = describe_transport_error(&e, timeout);
            warn!(url, error = %e, elapsed, "HTTP request failed.");
            return CheckResult::failure(CheckKind::Http, message, elapsed);
        }
    };

    let status = response.status().as_u16();
    debug!(url, status, final_url = %response.url(), "Received response, reading body.");

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            let elapsed = elapsed_ms(start);
            warn!(url, status, error = %e, "Failed to read response body.");
            let details = HttpDetails {
                status_code: Some(status),
                latency_ms: Some(elapsed),
                keyword_matched: None,
            };
            let message = if e.is_timeout() {
                describe_transport_error(&e, timeout)
            } else {
                format!("Failed to read response body: {}", e)
            };
            return CheckResult::failure_with(CheckDetails::Http(details), message, elapsed);
        }
    };

    let latency_ms = elapsed_ms(start);
    let keyword_matched = expect_keyword.map(|kw| body.contains(kw));
    let details = CheckDetails::Http(HttpDetails {
        status_code: Some(status),
        latency_ms: Some(latency_ms),
        keyword_matched,
    });

    match (expect_keyword, keyword_matched) {
        (Some(kw), Some(false)) => {
            info!(url, status, keyword = kw, "Expected keyword not found.");
            CheckResult::failure_with(details, format!("Keyword '{}' not found", kw), latency_ms)
        }
        _ => {
            info!(url, status, latency_ms, "HTTP check finished.");
            CheckResult::success(details, latency_ms)
        }
    }
}

/// Turns a reqwest error into text that keeps timeouts and connection failures apart.
///
/// `timeout` is the total request timeout. A connect timeout is a connection failure, so it
/// never reports that number.
pub(crate) fn describe_transport_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_connect() {
        format!("Connection failed: {}", error_chain(e))
    } else if e.is_timeout() {
        format!("Request timed out after {}s", timeout.as_secs())
    } else {
        format!("HTTP request failed: {}", error_chain(e))
    }
}

/// reqwest's top-level message is terse ("error sending request"); the cause is in the source
/// chain.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !parts.contains(&text) {
            parts.push(text);
        }
        source = inner.source();
    }
    parts.join(": ")
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
