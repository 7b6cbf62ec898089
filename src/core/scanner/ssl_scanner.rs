// src/core/scanner/ssl_scanner.rs

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use native_tls::TlsConnector;
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info, warn};
use url::{Host, Url};
use x509_parser::prelude::*;

use crate::core::models::{CheckDetails, CheckKind, CheckResult, SslDetails};
use crate::core::scanner::http_scanner::elapsed_ms;

#[derive(Debug, Error)]
enum TlsFailure {
    #[error("TCP Connection Error: {0}")]
    Connect(String),
    #[error("TLS Handshake Error: {0}")]
    Handshake(String),
    #[error("{0}")]
    Certificate(String),
}

/// Reads the leaf certificate of the site's TLS endpoint and reports its expiry and issuer.
///
/// No HTTP is spoken. A certificate that parses is a successful check whatever its expiry;
/// judging the day count is left to the consumer (see `ExpiryPolicy`).
pub async fn run_ssl_scan(url: &Url, timeout: Duration) -> CheckResult {
    let start = Instant::now();
    let (host, port) = match tls_target(url) {
        Ok(t) => t,
        Err(e) => return CheckResult::failure(CheckKind::Ssl, e, elapsed_ms(start)),
    };
    info!(host = %host, port, "Starting SSL/TLS check.");

    // Connect, handshake and a possible unverified retry each get `timeout`.
    let budget = timeout * 3;
    let task_host = host.clone();
    debug!("Spawning blocking task for TLS connection.");
    let task = spawn_blocking(move || perform_tls_scan(&task_host, port, timeout));

    let outcome = match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(panic = %e, "Blocking SSL scan task panicked!");
            Err(format!("Task panicked: {}", e))
        }
        Err(_) => {
            warn!(host = %host, "SSL/TLS check exceeded its time budget.");
            Err(format!("TLS check timed out after {}s", budget.as_secs()))
        }
    };

    let elapsed = elapsed_ms(start);
    match outcome {
        Ok(details) => {
            info!(
                host = %host,
                days_to_expiry = details.days_to_expiry,
                trusted = details.trusted,
                "SSL/TLS check finished."
            );
            CheckResult::success(CheckDetails::Ssl(details), elapsed)
        }
        Err(message) => {
            warn!(host = %host, error = %message, "SSL/TLS check failed.");
            CheckResult::failure(CheckKind::Ssl, message, elapsed)
        }
    }
}

/// Host and port to connect to; the port defaults to 443.
pub fn tls_target(url: &Url) -> Result<(String, u16), String> {
    let host = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(format!("URL has no host: {}", url)),
    };
    Ok((host, url.port_or_known_default().unwrap_or(443)))
}

fn perform_tls_scan(host: &str, port: u16, timeout: Duration) -> Result<SslDetails, String> {
    let (cert_der, trusted) = match fetch_leaf_certificate(host, port, timeout, true) {
        Ok(der) => (der, true),
        Err(TlsFailure::Handshake(reason)) => {
            // Expired or self-signed certificates fail verification; read them anyway.
            warn!(host, reason = %reason, "Verified handshake failed, retrying without verification.");
            let der = fetch_leaf_certificate(host, port, timeout, false).map_err(|e| e.to_string())?;
            (der, false)
        }
        Err(other) => return Err(other.to_string()),
    };

    let (_, x509) = parse_x509_certificate(&cert_der).map_err(|e| {
        error!(error = %e, "Failed to parse X.509 certificate");
        format!("X.509 Parse Error: {}", e)
    })?;
    debug!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let not_after = asn1_time_to_chrono_utc(&x509.validity().not_after)?;
    Ok(SslDetails {
        host: host.to_string(),
        port,
        days_to_expiry: days_until(not_after, Utc::now()),
        not_after: not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
        issuer: issuer_name(&x509),
        trusted,
    })
}

fn fetch_leaf_certificate(
    host: &str,
    port: u16,
    timeout: Duration,
    verify: bool,
) -> Result<Vec<u8>, TlsFailure> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(!verify)
        .danger_accept_invalid_hostnames(!verify)
        .build()
        .map_err(|e| TlsFailure::Handshake(format!("TlsConnector Error: {}", e)))?;

    debug!(host, port, verify, "Connecting TCP stream.");
    let stream = connect(host, port, timeout)?;

    debug!(host, "Performing TLS handshake.");
    let stream = connector
        .connect(host, stream)
        .map_err(|e| TlsFailure::Handshake(e.to_string()))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| TlsFailure::Certificate(format!("Could not get peer certificate: {}", e)))?
        .ok_or_else(|| TlsFailure::Certificate("Server did not provide a certificate.".to_string()))?;

    cert.to_der()
        .map_err(|e| TlsFailure::Certificate(format!("Could not convert certificate to DER: {}", e)))
}

fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TlsFailure> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| TlsFailure::Connect(format!("could not resolve {}: {}", host, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|_| stream.set_write_timeout(Some(timeout)))
                    .map_err(|e| TlsFailure::Connect(e.to_string()))?;
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect attempt failed.");
                last_error = Some(e);
            }
        }
    }
    Err(TlsFailure::Connect(match last_error {
        Some(e) => e.to_string(),
        None => format!("no addresses found for {}", host),
    }))
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| format!("Certificate notAfter out of range: {}", time))
}

/// Issuer common name, or the full issuer DN when there is no CN.
fn issuer_name(x509: &X509Certificate<'_>) -> String {
    x509.issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| x509.issuer().to_string())
}

/// Whole days from `now` until `not_after`, rounded toward negative infinity.
pub fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (not_after - now).num_seconds().div_euclid(86_400)
}
