// src/core/scanner/headers_scanner.rs

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::core::models::{CheckDetails, CheckKind, CheckResult, Grade, HeadersDetails};
use crate::core::policy::{HeaderPolicy, HeaderRule};
use crate::core::scanner::http_scanner::{describe_transport_error, elapsed_ms};

/// Looks up a policy header (or one of its aliases) in a `HeaderMap`.
///
/// Non-UTF-8 values are reported as a placeholder so the header still counts as present.
fn header_value(headers: &HeaderMap, rule: &HeaderRule) -> Option<String> {
    std::iter::once(&rule.header)
        .chain(rule.aliases.iter())
        .find_map(|name| headers.get(name.as_str()))
        .map(|value| match value.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                warn!(header_name = %rule.header, "Header found but contained invalid UTF-8.");
                "[Invalid UTF-8]".to_string()
            }
        })
}

/// Applies every rule of the policy to a set of response headers, in policy order.
pub fn evaluate_headers(
    headers: &HeaderMap,
    policy: &HeaderPolicy,
) -> (Vec<String>, BTreeMap<String, String>) {
    let mut issues = Vec::new();
    let mut sample = BTreeMap::new();

    for rule in &policy.rules {
        let value = header_value(headers, rule);
        debug!(header_name = %rule.header, present = value.is_some(), "Checking header.");
        if let Some(issue) = rule.evaluate(value.as_deref()) {
            issues.push(issue);
        }
        sample.insert(rule.header.clone(), value.unwrap_or_default());
    }
    (issues, sample)
}

/// Grades the security headers a site returns.
///
/// A `HEAD` request is tried first; servers that reject it with 405 or 501 get a `GET`.
/// `ok` only says whether the fetch worked. A failed fetch carries no grade.
pub async fn run_headers_scan(
    client: &Client,
    url: &str,
    policy: &HeaderPolicy,
    timeout: Duration,
) -> CheckResult {
    info!(url, "Starting headers check.");
    let start = Instant::now();

    let headers = match fetch_headers(client, url).await {
        Ok(h) => h,
        Err(e) => {
            warn!(url, error = %e, "HTTP request failed for headers check.");
            return CheckResult::failure(
                CheckKind::Headers,
                describe_transport_error(&e, timeout),
                elapsed_ms(start),
            );
        }
    };

    let (issues, sample) = evaluate_headers(&headers, policy);
    let grade: Grade = policy.grade(&issues);
    info!(url, %grade, issues = issues.len(), "Headers check finished.");

    CheckResult::success(
        CheckDetails::Headers(HeadersDetails { grade, issues, sample }),
        elapsed_ms(start),
    )
}

async fn fetch_headers(client: &Client, url: &str) -> Result<HeaderMap, reqwest::Error> {
    let response = match client.head(url).send().await {
        Ok(r) if matches!(
            r.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) =>
        {
            debug!(url, status = %r.status(), "HEAD rejected, falling back to GET.");
            client.get(url).send().await?
        }
        Ok(r) => r,
        Err(e) => return Err(e),
    };
    debug!(url, status = %response.status(), "Received HTTP response for headers check.");
    Ok(response.headers().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, HeaderValue::from_static(v));
        }
        headers
    }

    fn hardened() -> HeaderMap {
        map(&[
            ("strict-transport-security", "max-age=63072000; includeSubDomains; preload"),
            ("content-security-policy", "default-src 'self'"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "strict-origin-when-cross-origin"),
            ("permissions-policy", "geolocation=()"),
        ])
    }

    #[test]
    fn hardened_site_gets_an_a() {
        let policy = HeaderPolicy::default();
        let (issues, sample) = evaluate_headers(&hardened(), &policy);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(policy.grade(&issues), Grade::A);
        assert_eq!(sample["x-frame-options"], "DENY");
    }

    #[test]
    fn bare_site_gets_an_f() {
        let policy = HeaderPolicy::default();
        let (issues, sample) = evaluate_headers(&HeaderMap::new(), &policy);
        assert_eq!(issues.len(), 6);
        assert_eq!(issues[0], "Missing Strict-Transport-Security");
        assert_eq!(policy.grade(&issues), Grade::F);
        assert_eq!(sample["content-security-policy"], "");
    }

    #[test]
    fn legacy_feature_policy_is_accepted() {
        let mut headers = hardened();
        headers.remove("permissions-policy");
        headers.insert("feature-policy", HeaderValue::from_static("camera 'none'"));
        let (issues, sample) = evaluate_headers(&headers, &HeaderPolicy::default());
        assert!(issues.is_empty());
        assert_eq!(sample["permissions-policy"], "camera 'none'");
    }

    #[test]
    fn grade_does_not_depend_on_header_order() {
        let policy = HeaderPolicy::default();
        let a = map(&[("x-frame-options", "DENY"), ("referrer-policy", "unsafe-url")]);
        let b = map(&[("referrer-policy", "unsafe-url"), ("x-frame-options", "DENY")]);
        let (ia, _) = evaluate_headers(&a, &policy);
        let (ib, _) = evaluate_headers(&b, &policy);
        assert_eq!(ia, ib);
        assert_eq!(policy.grade(&ia), policy.grade(&ib));
    }

    #[test]
    fn injected_policy_is_honoured() {
        let default = HeaderPolicy::default();
        let csp_only = HeaderPolicy::new(vec![default.rules[1].clone()], default.thresholds);
        let (issues, _) = evaluate_headers(&HeaderMap::new(), &csp_only);
        assert_eq!(issues, vec!["Missing Content-Security-Policy".to_string()]);
        assert_eq!(csp_only.grade(&issues), Grade::B);
    }
}
