//! QuickShield CE library
//!
//! Point-in-time site health probe. For each configured site it can run:
//! - an HTTP uptime check with optional keyword verification
//! - a TLS certificate expiry check
//! - a security-header grade
//! - a DNS snapshot with a stable fingerprint for change detection
//!
//! Results come back as a `RunReport`, which the `report` module writes as JSON and/or CSV.
//!
//! ```rust,ignore
//! use quickshield::core::models::{CheckKind, ReportFormat, SiteSpec};
//! use quickshield::core::policy::HeaderPolicy;
//! use quickshield::core::scanner::{Scanner, ScannerSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scanner = Scanner::new(ScannerSettings::default(), HeaderPolicy::default()).unwrap();
//!     let sites = vec![SiteSpec {
//!         name: "Example".into(),
//!         url: "https://example.com".into(),
//!         expect_keyword: None,
//!     }];
//!     let report = scanner.run(&sites, &[CheckKind::Http], ReportFormat::Json).await;
//!     println!("{} failed checks", report.failed_checks());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod report;
pub mod schedule;

pub use cli::Cli;
pub use crate::core::models::{CheckKind, CheckResult, RunReport, SiteRecord, SiteSpec};
pub use crate::core::scanner::{Scanner, ScannerSettings};
