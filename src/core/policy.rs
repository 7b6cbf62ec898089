//! Header policy, grading thresholds and TLS expiry classification.
//!
//! The header policy is plain data: a list of header rules plus the issue-count thresholds
//! that map an issue set to a letter grade. `HeaderPolicy::default()` is the stock policy;
//! tests and callers can hand the headers scanner any other policy.

use crate::core::models::Grade;
use once_cell::sync::Lazy;
use regex::Regex;
use strum::Display;

/// `max-age=<n>` inside an HSTS value, case-insensitive.
static RE_MAX_AGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*max-age\s*=\s*(.*?)\s*$").expect("valid regex"));

/// Roughly 180 days.
pub const HSTS_MIN_MAX_AGE: u64 = 15_552_000;

/// What a rule expects from a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any non-empty value.
    Present,
    /// Value must equal one of these, compared case-insensitively after trimming.
    OneOf(Vec<String>),
    /// HSTS-style `max-age` directive at or above the given number of seconds.
    MinMaxAge(u64),
}

/// A single header policy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRule {
    /// Lowercase header name.
    pub header: String,
    /// Legacy names accepted in place of `header` (e.g. `feature-policy`).
    pub aliases: Vec<String>,
    pub requirement: Requirement,
    /// Issue reported when the header is absent.
    pub missing: String,
    /// Issue reported when the header is present but does not meet the requirement.
    pub weak: String,
}

impl HeaderRule {
    pub fn new(header: &str, requirement: Requirement, missing: &str, weak: &str) -> Self {
        Self {
            header: header.to_string(),
            aliases: Vec::new(),
            requirement,
            missing: missing.to_string(),
            weak: weak.to_string(),
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Evaluates an observed value (`None` when absent) and returns the issue, if any.
    pub fn evaluate(&self, value: Option<&str>) -> Option<String> {
        let value = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Some(self.missing.clone()),
        };
        match &self.requirement {
            Requirement::Present => None,
            Requirement::OneOf(allowed) => {
                if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
                    None
                } else {
                    Some(self.weak.clone())
                }
            }
            Requirement::MinMaxAge(min) => match parse_max_age(value) {
                Some(Ok(age)) if age >= *min => None,
                Some(Ok(_)) | None => Some(self.weak.clone()),
                Some(Err(())) => Some("HSTS not parseable".to_string()),
            },
        }
    }
}

/// Finds the `max-age` directive. `None` if there is no such directive, `Some(Err)` if it is
/// there but not a number.
fn parse_max_age(value: &str) -> Option<Result<u64, ()>> {
    value.split(';').find_map(|directive| {
        RE_MAX_AGE.captures(directive).map(|caps| {
            caps[1]
                .trim_matches('"')
                .parse::<u64>()
                .map_err(|_| ())
        })
    })
}

/// Upper bounds (inclusive) on the issue count for grades B, C and D. Zero issues is always
/// an A; anything above `d_max` is an F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeThresholds {
    b_max: usize,
    c_max: usize,
    d_max: usize,
}

impl GradeThresholds {
    /// Bounds are clamped so they never decrease, which keeps grading monotonic.
    pub fn new(b_max: usize, c_max: usize, d_max: usize) -> Self {
        let b_max = b_max.max(1);
        let c_max = c_max.max(b_max);
        let d_max = d_max.max(c_max);
        Self { b_max, c_max, d_max }
    }

    pub fn grade(&self, issue_count: usize) -> Grade {
        match issue_count {
            0 => Grade::A,
            n if n <= self.b_max => Grade::B,
            n if n <= self.c_max => Grade::C,
            n if n <= self.d_max => Grade::D,
            _ => Grade::F,
        }
    }
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self::new(2, 4, 5)
    }
}

/// The full policy consulted by the headers scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPolicy {
    pub rules: Vec<HeaderRule>,
    pub thresholds: GradeThresholds,
}

impl HeaderPolicy {
    pub fn new(rules: Vec<HeaderRule>, thresholds: GradeThresholds) -> Self {
        Self { rules, thresholds }
    }

    /// Grade for an issue set. Only the size matters, so header order is irrelevant.
    pub fn grade(&self, issues: &[String]) -> Grade {
        self.thresholds.grade(issues.len())
    }
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        let rules = vec![
            HeaderRule::new(
                "strict-transport-security",
                Requirement::MinMaxAge(HSTS_MIN_MAX_AGE),
                "Missing Strict-Transport-Security",
                "HSTS max-age < 15552000",
            ),
            HeaderRule::new(
                "content-security-policy",
                Requirement::Present,
                "Missing Content-Security-Policy",
                "Missing Content-Security-Policy",
            ),
            HeaderRule::new(
                "x-content-type-options",
                Requirement::OneOf(vec!["nosniff".into()]),
                "X-Content-Type-Options not 'nosniff'",
                "X-Content-Type-Options not 'nosniff'",
            ),
            HeaderRule::new(
                "x-frame-options",
                Requirement::OneOf(vec!["deny".into(), "sameorigin".into()]),
                "X-Frame-Options not DENY/SAMEORIGIN",
                "X-Frame-Options not DENY/SAMEORIGIN",
            ),
            HeaderRule::new(
                "referrer-policy",
                Requirement::OneOf(
                    [
                        "no-referrer",
                        "no-referrer-when-downgrade",
                        "strict-origin",
                        "strict-origin-when-cross-origin",
                        "same-origin",
                        "origin",
                        "origin-when-cross-origin",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                ),
                "Referrer-Policy missing or lax",
                "Referrer-Policy missing or lax",
            ),
            HeaderRule::new(
                "permissions-policy",
                Requirement::Present,
                "Missing Permissions-Policy",
                "Missing Permissions-Policy",
            )
            .with_alias("feature-policy"),
        ];
        Self::new(rules, GradeThresholds::default())
    }
}

/// How a TLS day count reads against a warning window. Purely advisory: the TLS check is
/// `ok` whenever the certificate could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExpiryStatus {
    Valid,
    #[strum(serialize = "expiring soon")]
    ExpiringSoon,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub warn_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self { warn_days: 30 }
    }
}

impl ExpiryPolicy {
    pub fn classify(&self, days_to_expiry: i64) -> ExpiryStatus {
        if days_to_expiry < 0 {
            ExpiryStatus::Expired
        } else if days_to_expiry <= self.warn_days {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("issue {i}")).collect()
    }

    #[test]
    fn default_thresholds() {
        let policy = HeaderPolicy::default();
        let grades: Vec<Grade> = (0..=7).map(|n| policy.grade(&issues(n))).collect();
        assert_eq!(
            grades,
            vec![Grade::A, Grade::B, Grade::B, Grade::C, Grade::C, Grade::D, Grade::F, Grade::F]
        );
    }

    #[test]
    fn grading_never_improves_when_issues_are_added() {
        for thresholds in [
            GradeThresholds::default(),
            GradeThresholds::new(1, 1, 1),
            GradeThresholds::new(5, 2, 3),
            GradeThresholds::new(0, 0, 10),
        ] {
            let mut previous = Grade::A;
            for n in 0..12 {
                let grade = thresholds.grade(n);
                assert!(grade >= previous, "{thresholds:?}: {n} issues graded {grade}");
                previous = grade;
            }
        }
    }

    #[test]
    fn out_of_order_bounds_are_clamped() {
        let t = GradeThresholds::new(5, 2, 3);
        assert_eq!(t.grade(5), Grade::B);
        assert_eq!(t.grade(6), Grade::F);
    }

    #[test]
    fn hsts_rule() {
        let rule = &HeaderPolicy::default().rules[0];
        assert_eq!(rule.evaluate(None).as_deref(), Some("Missing Strict-Transport-Security"));
        assert_eq!(rule.evaluate(Some("max-age=31536000; includeSubDomains")), None);
        assert_eq!(rule.evaluate(Some("Max-Age=\"15552000\"")), None);
        assert_eq!(
            rule.evaluate(Some("max-age=300")).as_deref(),
            Some("HSTS max-age < 15552000")
        );
        assert_eq!(
            rule.evaluate(Some("max-age=forever")).as_deref(),
            Some("HSTS not parseable")
        );
        assert_eq!(
            rule.evaluate(Some("includeSubDomains")).as_deref(),
            Some("HSTS max-age < 15552000")
        );
    }

    #[test]
    fn enumerated_values_are_case_insensitive() {
        let xfo = &HeaderPolicy::default().rules[3];
        assert_eq!(xfo.evaluate(Some("SAMEORIGIN")), None);
        assert_eq!(xfo.evaluate(Some("Deny")), None);
        assert!(xfo.evaluate(Some("ALLOW-FROM https://x")).is_some());
    }

    #[test]
    fn expiry_classification() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.classify(-1), ExpiryStatus::Expired);
        assert_eq!(policy.classify(0), ExpiryStatus::ExpiringSoon);
        assert_eq!(policy.classify(30), ExpiryStatus::ExpiringSoon);
        assert_eq!(policy.classify(31), ExpiryStatus::Valid);
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let csp = &HeaderPolicy::default().rules[1];
        assert_eq!(csp.evaluate(Some("  ")).as_deref(), Some("Missing Content-Security-Policy"));
    }
}
