// src/core/scanner/mod.rs

// This file is the public interface of the `scanner` module: it owns the shared network
// clients and runs the individual scanners for each site of a run.
pub mod dns_scanner;
pub mod headers_scanner;
pub mod http_scanner;
pub mod ssl_scanner;

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::system_conf::read_system_conf;
use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, info, warn};
use url::Url;

use self::dns_scanner::run_dns_scan;
use self::headers_scanner::run_headers_scan;
use self::http_scanner::run_http_scan;
use self::ssl_scanner::{run_ssl_scan, tls_target};
use crate::core::models::{
    CheckKind, CheckResult, ReportFormat, RunReport, SiteRecord, SiteSpec, normalize_selection,
};
use crate::core::policy::HeaderPolicy;
use crate::error::ScannerError;

/// Redirect hops followed by the HTTP and headers checks.
pub const MAX_REDIRECTS: usize = 10;

/// Timeouts and limits for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings {
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub tls_timeout: Duration,
    pub dns_timeout: Duration,
    /// Sites checked at the same time.
    pub concurrency: usize,
    pub user_agent: String,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_env_proxy: bool,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            tls_timeout: Duration::from_secs(5),
            dns_timeout: Duration::from_secs(5),
            concurrency: 4,
            user_agent: default_user_agent(),
            use_env_proxy: true,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("quickshield-ce/{}", env!("CARGO_PKG_VERSION"))
}

/// The check engine. Holds the HTTP client and DNS resolver shared by every check of a run.
pub struct Scanner {
    client: Client,
    resolver: TokioAsyncResolver,
    settings: ScannerSettings,
    policy: HeaderPolicy,
}

impl Scanner {
    pub fn new(settings: ScannerSettings, policy: HeaderPolicy) -> Result<Self, ScannerError> {
        let mut builder = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.http_timeout)
            .connect_timeout(settings.connect_timeout)
            .redirect(Policy::limited(MAX_REDIRECTS));
        if !settings.use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(ScannerError::HttpClient)?;

        let resolver = system_resolver(settings.dns_timeout);

        Ok(Self {
            client,
            resolver,
            settings,
            policy,
        })
    }

    /// Replaces the DNS resolver, e.g. to query a specific name server.
    pub fn with_resolver(mut self, resolver: TokioAsyncResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Runs every selected kind that applies to the site and collects one result per kind,
    /// in selection order. Duplicate kinds run once and an empty selection means every kind.
    /// Kinds run concurrently and never affect each other. TLS is left out for non-`https`
    /// URLs.
    pub async fn scan_site(&self, site: &SiteSpec, kinds: &[CheckKind]) -> SiteRecord {
        info!(site = %site.name, url = %site.url, "Checking site.");
        let kinds = normalize_selection(kinds.iter().copied());

        let url = match parse_site_url(&site.url) {
            Ok(u) => u,
            Err(message) => {
                // Upstream validation should have caught this; report it on every kind.
                warn!(site = %site.name, error = %message, "Site URL rejected by the engine.");
                return SiteRecord {
                    name: site.name.clone(),
                    url: site.url.clone(),
                    results: kinds
                        .iter()
                        .map(|k| CheckResult::failure(*k, message.clone(), 0))
                        .collect(),
                };
            }
        };

        let applicable: Vec<CheckKind> = kinds
            .iter()
            .copied()
            .filter(|k| {
                let applies = k.applies_to(&url);
                if !applies {
                    debug!(site = %site.name, kind = %k, "Kind does not apply to this URL, skipping.");
                }
                applies
            })
            .collect();

        let results = join_all(applicable.iter().map(|k| self.run_check(*k, site, &url))).await;

        let failed = results.iter().filter(|r| !r.ok).count();
        info!(site = %site.name, checks = results.len(), failed, "Site finished.");
        SiteRecord {
            name: site.name.clone(),
            url: site.url.clone(),
            results,
        }
    }

    async fn run_check(&self, kind: CheckKind, site: &SiteSpec, url: &Url) -> CheckResult {
        match kind {
            CheckKind::Http => {
                run_http_scan(
                    &self.client,
                    url.as_str(),
                    site.expect_keyword.as_deref(),
                    self.settings.http_timeout,
                )
                .await
            }
            CheckKind::Ssl => run_ssl_scan(url, self.settings.tls_timeout).await,
            CheckKind::Headers => {
                run_headers_scan(
                    &self.client,
                    url.as_str(),
                    &self.policy,
                    self.settings.http_timeout,
                )
                .await
            }
            CheckKind::Dns => match tls_target(url) {
                Ok((host, _)) => {
                    run_dns_scan(&self.resolver, &host, self.settings.dns_timeout).await
                }
                Err(message) => CheckResult::failure(CheckKind::Dns, message, 0),
            },
        }
    }

    /// Checks every site and assembles the report. Sites run `concurrency` at a time; the
    /// report keeps input order and one `generated_at` stamped before any check starts.
    pub async fn run(
        &self,
        sites: &[SiteSpec],
        kinds: &[CheckKind],
        format: ReportFormat,
    ) -> RunReport {
        let generated_at = Utc::now();
        let selected_kinds = normalize_selection(kinds.iter().copied());
        info!(
            sites = sites.len(),
            kinds = ?selected_kinds,
            concurrency = self.settings.concurrency,
            "Starting run."
        );

        let records: Vec<SiteRecord> = stream::iter(sites)
            .map(|site| self.scan_site(site, &selected_kinds))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let report = RunReport {
            generated_at,
            format,
            selected_kinds,
            sites: records,
        };
        info!(failed_checks = report.failed_checks(), "Run finished.");
        report
    }
}

/// Resolver built from the system configuration (`/etc/resolv.conf` on Unix), so the DNS
/// check sees the same names as the HTTP client. Falls back to the built-in defaults when the
/// system configuration cannot be read.
fn system_resolver(timeout: Duration) -> TokioAsyncResolver {
    let (config, mut opts) = match read_system_conf() {
        Ok(conf) => conf,
        Err(e) => {
            warn!(error = %e, "Could not read system DNS configuration, using defaults.");
            (ResolverConfig::default(), ResolverOpts::default())
        }
    };
    opts.timeout = timeout;
    opts.attempts = 1;
    TokioAsyncResolver::tokio(config, opts)
}

fn parse_site_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid site URL '{}': {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(format!("Invalid site URL '{}': expected an http(s) URL with a host", raw));
    }
    Ok(url)
}
