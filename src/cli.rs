//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::core::models::{CheckKind, ReportFormat, UnknownCheckKind, parse_selection};
use crate::report::DEFAULT_OUTPUT_DIR;
use crate::schedule::{Preset, SnippetStyle};

#[derive(Parser, Debug)]
#[command(name = "quickshield")]
#[command(version)]
#[command(about = "QuickShield CE: point-in-time uptime, TLS, header and DNS checks", long_about = None)]
#[command(arg_required_else_help = true, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a starter quickshield.yml
    Init {
        /// Where to write the config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },

    /// Validate quickshield.yml and print any issues
    Validate {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },

    /// Run checks now and write a report
    Check {
        /// Path to config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,

        /// Comma separated subset of checks: http,ssl,headers,dns (default: all)
        #[arg(long, value_name = "KINDS", value_parser = parse_only)]
        only: Option<Selection>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Directory for report files
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },

    /// Print a cron or systemd snippet that runs `check` on a schedule
    Schedule {
        /// How often to run
        #[arg(long, value_enum)]
        preset: Preset,

        /// Scheduler flavour
        #[arg(long, value_enum, default_value_t = SnippetStyle::Cron)]
        style: SnippetStyle,

        /// Forwarded to `check --only`
        #[arg(long, value_name = "KINDS", value_parser = parse_only)]
        only: Option<Selection>,

        /// Forwarded to `check --format`
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Forwarded to `check --path`
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

/// A parsed `--only` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(pub Vec<CheckKind>);

fn parse_only(raw: &str) -> Result<Selection, UnknownCheckKind> {
    parse_selection(raw).map(Selection)
}

/// Kinds to run for an optional `--only`; absent means every kind.
pub fn selected_kinds(only: Option<&Selection>) -> Vec<CheckKind> {
    only.map(|s| s.0.clone()).unwrap_or_else(CheckKind::all)
}
