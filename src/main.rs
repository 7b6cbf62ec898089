// src/main.rs

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info};

use quickshield::cli::{Cli, Commands, Selection, selected_kinds};
use quickshield::config::{self, Config};
use quickshield::core::models::{CheckKind, CheckResult, ReportFormat, SiteRecord};
use quickshield::core::policy::{ExpiryPolicy, HeaderPolicy};
use quickshield::core::scanner::Scanner;
use quickshield::error::ConfigError;
use quickshield::logging;
use quickshield::report;
use quickshield::schedule::{self, ScheduleRequest};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match logging::initialize_logging() {
        Ok(path) => info!(log = %path.display(), "quickshield {} starting.", env!("CARGO_PKG_VERSION")),
        Err(e) => eprintln!("warning: file logging disabled: {e}"),
    }

    match cli.command {
        Commands::Init { path } => init(&path),
        Commands::Validate { path } => validate(&path),
        Commands::Check {
            path,
            only,
            format,
            output_dir,
        } => check(&path, only.as_ref(), format, &output_dir).await,
        Commands::Schedule {
            preset,
            style,
            only,
            format,
            path,
        } => {
            let working_dir = std::env::current_dir().wrap_err("Could not read current directory")?;
            let kinds = only.map(|s| s.0).unwrap_or_default();
            let snippet = schedule::render(&ScheduleRequest {
                preset,
                style,
                only: &kinds,
                format,
                config_path: &path,
                working_dir: &working_dir,
            });
            print!("{snippet}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init(path: &Path) -> Result<ExitCode> {
    match config::write_default_config(path) {
        Ok(()) => {
            println!("Created {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ ConfigError::AlreadyExists { .. }) => {
            println!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).wrap_err("Could not create config"),
    }
}

fn validate(path: &Path) -> Result<ExitCode> {
    match load(path) {
        Some(_) => {
            println!("Config looks good ✅");
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

/// Loads and validates, printing every problem. `None` means the caller should exit 1.
fn load(path: &Path) -> Option<Config> {
    match config::load_validated(path) {
        Ok(cfg) => Some(cfg),
        Err(ConfigError::Invalid(issues)) => {
            println!("Config has issues:");
            for issue in issues {
                println!(" - {issue}");
            }
            None
        }
        Err(e) => {
            error!(error = %e, "Config could not be loaded.");
            println!("{e}");
            None
        }
    }
}

async fn check(
    path: &Path,
    only: Option<&Selection>,
    format: ReportFormat,
    output_dir: &Path,
) -> Result<ExitCode> {
    let Some(cfg) = load(path) else {
        return Ok(ExitCode::FAILURE);
    };

    let kinds = selected_kinds(only);
    let scanner = Scanner::new(cfg.scanner_settings(), HeaderPolicy::default())
        .wrap_err("Could not initialise the check engine")?;
    let report = scanner.run(&cfg.site_specs(), &kinds, format).await;

    let expiry = ExpiryPolicy::default();
    for site in &report.sites {
        println!("{}", summarize_site(site, &expiry));
    }

    let written = report::write_reports(&report, output_dir)
        .wrap_err_with(|| format!("Could not write reports to {}", output_dir.display()))?;
    for file in &written {
        println!("Wrote {}", file.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn summarize_site(site: &SiteRecord, expiry: &ExpiryPolicy) -> String {
    let mark = if site.all_ok() { "✔" } else { "✘" };
    let parts: Vec<String> = site
        .results
        .iter()
        .map(|r| summarize_result(r, expiry))
        .collect();
    format!("{} {}  {}", mark, site.name, parts.join(" | "))
}

fn summarize_result(result: &CheckResult, expiry: &ExpiryPolicy) -> String {
    let kind = result.kind;
    if let Some(err) = result.error.as_deref().filter(|_| result.http().is_none()) {
        return format!("{kind} error: {err}");
    }
    match kind {
        CheckKind::Http => {
            let http = result.http().cloned().unwrap_or_default();
            let status = http.status_code.map_or("-".to_string(), |s| s.to_string());
            let latency = http.latency_ms.map_or(String::new(), |ms| format!(" ({ms} ms)"));
            match &result.error {
                Some(err) => format!("http {status}{latency} error: {err}"),
                None => format!("http {status}{latency}"),
            }
        }
        CheckKind::Ssl => match result.ssl() {
            Some(ssl) => format!(
                "ssl {}d {} ({})",
                ssl.days_to_expiry,
                expiry.classify(ssl.days_to_expiry),
                ssl.issuer
            ),
            None => "ssl -".to_string(),
        },
        CheckKind::Headers => match result.headers() {
            Some(h) => format!("headers {} ({} issues)", h.grade, h.issues.len()),
            None => "headers -".to_string(),
        },
        CheckKind::Dns => match result.dns() {
            Some(d) => format!(
                "dns {} records {}",
                d.records.values().map(Vec::len).sum::<usize>(),
                &d.fingerprint[..12.min(d.fingerprint.len())]
            ),
            None => "dns -".to_string(),
        },
    }
}
