//! quickshield.yml: model, starter file, loading and validation.
//!
//! Validation happens here, before the engine runs. The engine assumes every `SiteSpec` it
//! receives is well formed.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::core::models::SiteSpec;
use crate::core::scanner::{ScannerSettings, default_user_agent};
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "quickshield.yml";

pub const DEFAULT_CONFIG: &str = r#"# QuickShield CE configuration
sites:
  - name: Example
    url: https://example.com
    expect_keyword: null   # optional string; set to null to disable
    checks:
      uptime_every: "5m"
      ssl_every: "24h"
      headers_every: "24h"
      dns_every: "6h"

# Optional engine tuning; every field falls back to its default.
settings:
  http_timeout_secs: 10
  connect_timeout_secs: 5
  tls_timeout_secs: 5
  dns_timeout_secs: 5
  concurrency: 4

license:
  key: "CE"  # Community Edition
"#;

static RE_INTERVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[smhd]$").expect("valid regex"));

/// Root of quickshield.yml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub settings: Settings,
    /// Accepted for compatibility; quickshield CE does not send alerts.
    #[serde(default)]
    pub alerts: Option<serde_yaml::Value>,
    #[serde(default)]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub expect_keyword: Option<String>,
    #[serde(default)]
    pub checks: Option<CheckIntervals>,
}

/// How often each check is meant to run. Informational: quickshield runs once per
/// invocation and leaves repetition to the OS scheduler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckIntervals {
    pub uptime_every: Option<String>,
    pub ssl_every: Option<String>,
    pub headers_every: Option<String>,
    pub dns_every: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub http_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub tls_timeout_secs: Option<u64>,
    pub dns_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub user_agent: Option<String>,
    pub use_env_proxy: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct License {
    pub key: Option<String>,
}

/// Writes the starter config. Never overwrites an existing file.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists { path: path.to_path_buf() });
    }
    fs::write(path, DEFAULT_CONFIG).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Wrote starter config.");
    Ok(())
}

/// Reads and parses a config file. The root must be a mapping.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ConfigError::NotFound { path: path.to_path_buf() },
        _ => ConfigError::Io { path: path.to_path_buf(), source },
    })?;
    debug!(path = %path.display(), bytes = raw.len(), "Read config file.");
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
    if !value.is_mapping() {
        return Err(ConfigError::Invalid(vec![
            "Config root must be a mapping (YAML object).".to_string(),
        ]));
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Loads a config and fails with every validation issue if there are any.
pub fn load_validated(path: &Path) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    let issues = validate(&config);
    if issues.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Invalid(issues))
    }
}

/// Returns every problem found, numbering sites from 1. An empty list means valid.
pub fn validate(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();
    if config.sites.is_empty() {
        errors.push("`sites` must be a non-empty list.".to_string());
        return errors;
    }

    for (i, site) in config.sites.iter().enumerate() {
        let n = i + 1;
        if site.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
            errors.push(format!("site #{n} is missing `name`."));
        }
        match site.url.as_deref().map(str::trim) {
            None | Some("") => errors.push(format!("site #{n} is missing `url`.")),
            Some(raw) => {
                if let Err(problem) = check_url(raw) {
                    errors.push(format!("site #{n} has an invalid `url` ({raw}): {problem}."));
                }
            }
        }
        if let Some(kw) = &site.expect_keyword {
            if kw.is_empty() {
                errors.push(format!("site #{n} has an empty `expect_keyword`; use null to disable."));
            }
        }
        if let Some(checks) = &site.checks {
            for (field, value) in [
                ("uptime_every", &checks.uptime_every),
                ("ssl_every", &checks.ssl_every),
                ("headers_every", &checks.headers_every),
                ("dns_every", &checks.dns_every),
            ] {
                if let Some(v) = value {
                    if !RE_INTERVAL.is_match(v.trim()) {
                        errors.push(format!(
                            "site #{n} `checks.{field}` must look like 30s, 5m, 24h or 7d (got {v:?})."
                        ));
                    }
                }
            }
        }
    }

    if config.settings.concurrency == Some(0) {
        errors.push("`settings.concurrency` must be at least 1.".to_string());
    }
    for (field, value) in [
        ("http_timeout_secs", config.settings.http_timeout_secs),
        ("connect_timeout_secs", config.settings.connect_timeout_secs),
        ("tls_timeout_secs", config.settings.tls_timeout_secs),
        ("dns_timeout_secs", config.settings.dns_timeout_secs),
    ] {
        if value == Some(0) {
            errors.push(format!("`settings.{field}` must be at least 1."));
        }
    }
    errors
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme must be http or https, not {}", url.scheme()));
    }
    if url.host().is_none() {
        return Err("no host".to_string());
    }
    Ok(())
}

impl Config {
    /// Site entries as the engine consumes them. Call after `validate`.
    pub fn site_specs(&self) -> Vec<SiteSpec> {
        self.sites
            .iter()
            .map(|s| SiteSpec {
                name: s.name.clone().unwrap_or_default().trim().to_string(),
                url: s.url.clone().unwrap_or_default().trim().to_string(),
                expect_keyword: s.expect_keyword.clone(),
            })
            .collect()
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        let defaults = ScannerSettings::default();
        let secs = |v: Option<u64>, d: Duration| v.map(Duration::from_secs).unwrap_or(d);
        ScannerSettings {
            http_timeout: secs(self.settings.http_timeout_secs, defaults.http_timeout),
            connect_timeout: secs(self.settings.connect_timeout_secs, defaults.connect_timeout),
            tls_timeout: secs(self.settings.tls_timeout_secs, defaults.tls_timeout),
            dns_timeout: secs(self.settings.dns_timeout_secs, defaults.dns_timeout),
            concurrency: self.settings.concurrency.unwrap_or(defaults.concurrency),
            user_agent: self
                .settings
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
            use_env_proxy: self.settings.use_env_proxy.unwrap_or(defaults.use_env_proxy),
        }
    }
}
