// src/core/scanner/dns_scanner.rs

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::models::{CheckDetails, CheckKind, CheckResult, DnsDetails};
use crate::core::scanner::http_scanner::elapsed_ms;

/// Record types captured by the DNS snapshot, in the canonical order used for the fingerprint.
pub const RECORD_TYPES: [RecordType; 4] =
    [RecordType::A, RecordType::AAAA, RecordType::CNAME, RecordType::MX];

/// Resolves A, AAAA, CNAME and MX for `host` and fingerprints the result.
///
/// A type with no answers (NOERROR) is an empty list, not a failure. NXDOMAIN, SERVFAIL,
/// REFUSED, timeouts and other resolver errors fail the check and no records are reported.
pub async fn run_dns_scan(
    resolver: &TokioAsyncResolver,
    host: &str,
    timeout: Duration,
) -> CheckResult {
    info!(host, "Starting DNS check.");
    let start = Instant::now();

    let (a, aaaa, cname, mx) = tokio::join!(
        lookup(resolver, host, RECORD_TYPES[0], timeout),
        lookup(resolver, host, RECORD_TYPES[1], timeout),
        lookup(resolver, host, RECORD_TYPES[2], timeout),
        lookup(resolver, host, RECORD_TYPES[3], timeout),
    );

    let mut records = BTreeMap::new();
    for (rtype, outcome) in RECORD_TYPES.iter().zip([a, aaaa, cname, mx]) {
        match outcome {
            Ok(values) => {
                records.insert(rtype.to_string(), values);
            }
            Err(message) => {
                warn!(host, record_type = %rtype, error = %message, "DNS resolution failed.");
                return CheckResult::failure(CheckKind::Dns, message, elapsed_ms(start));
            }
        }
    }

    let fingerprint = fingerprint(&records);
    info!(
        host,
        fingerprint = %fingerprint,
        total = records.values().map(Vec::len).sum::<usize>(),
        "DNS check finished."
    );
    CheckResult::success(
        CheckDetails::Dns(DnsDetails { records, fingerprint }),
        elapsed_ms(start),
    )
}

async fn lookup(
    resolver: &TokioAsyncResolver,
    host: &str,
    rtype: RecordType,
    timeout: Duration,
) -> Result<Vec<String>, String> {
    debug!(host, record_type = %rtype, "Looking up records.");
    let outcome = tokio::time::timeout(timeout, resolver.lookup(host, rtype)).await;
    match outcome {
        Err(_) => Err(format!("DNS {} lookup timed out after {}s", rtype, timeout.as_secs())),
        Ok(Ok(lookup)) => {
            let mut values: Vec<String> = lookup
                .record_iter()
                .filter(|r| r.record_type() == rtype)
                .filter_map(|r| r.data())
                .map(|data| data.to_string())
                .collect();
            values.sort();
            debug!(host, record_type = %rtype, count = values.len(), "Records resolved.");
            Ok(values)
        }
        Ok(Err(e)) => classify(host, rtype, &e),
    }
}

/// Only a NOERROR answer without records is data; every other outcome is a resolver failure.
fn classify(host: &str, rtype: RecordType, e: &ResolveError) -> Result<Vec<String>, String> {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NoError => {
                debug!(host, record_type = %rtype, "No records of this type.");
                Ok(Vec::new())
            }
            ResponseCode::NXDomain => Err(format!("NXDOMAIN: {} does not exist", host)),
            code => Err(format!("DNS {}: {} lookup for {} failed", code, rtype, host)),
        },
        _ => Err(format!("DNS Error: {}", e)),
    }
}

/// SHA-256 (lowercase hex) over the canonical form of a record set.
///
/// Types are visited in `RECORD_TYPES` order and values are sorted within each type, so
/// neither the resolver's answer order nor the map's iteration order affects the result.
/// The canonical string is `A:v1,v2|AAAA:|CNAME:|MX:v1`.
pub fn fingerprint(records: &BTreeMap<String, Vec<String>>) -> String {
    let canonical = RECORD_TYPES
        .iter()
        .map(|rtype| {
            let name = rtype.to_string();
            let mut values = records.get(&name).cloned().unwrap_or_default();
            values.sort();
            format!("{}:{}", name, values.join(","))
        })
        .collect::<Vec<_>>()
        .join("|");
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn fingerprint_ignores_value_order() {
        let a = records(&[("A", &["10.0.0.2", "10.0.0.1"]), ("MX", &["10 mx1.", "20 mx2."])]);
        let b = records(&[("MX", &["20 mx2.", "10 mx1."]), ("A", &["10.0.0.1", "10.0.0.2"])]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_treats_missing_and_empty_types_alike() {
        let sparse = records(&[("A", &["10.0.0.1"])]);
        let full = records(&[("A", &["10.0.0.1"]), ("AAAA", &[]), ("CNAME", &[]), ("MX", &[])]);
        assert_eq!(fingerprint(&sparse), fingerprint(&full));
    }

    #[test]
    fn fingerprint_changes_with_the_record_set() {
        let before = records(&[("A", &["10.0.0.1"])]);
        let after = records(&[("A", &["10.0.0.9"])]);
        assert_ne!(fingerprint(&before), fingerprint(&after));
    }

    #[test]
    fn fingerprint_keeps_values_within_their_type() {
        // Same values under a different type must not collide.
        let as_a = records(&[("A", &["x."])]);
        let as_cname = records(&[("CNAME", &["x."])]);
        assert_ne!(fingerprint(&as_a), fingerprint(&as_cname));
    }

    #[test]
    fn fingerprint_is_hex_sha256_of_the_canonical_string() {
        let empty = fingerprint(&BTreeMap::new());
        let expected = hex::encode(Sha256::digest(b"A:|AAAA:|CNAME:|MX:"));
        assert_eq!(empty, expected);
        assert_eq!(empty.len(), 64);
    }
}
