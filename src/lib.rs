//! Report E2E - Headless browser checks for the report dashboard.
//!
//! This crate provides:
//! - An availability probe with bounded linear retry
//! - Four dashboard scenarios (date filter, device filter, rendering, PDF
//!   download) sharing one wait/assert sequence
//! - A browser driver abstraction with a Chrome (CDP) backend and a scripted mock
//! - Deadline-bounded wait primitives over an injectable clock
//! - Session management for screenshots, markup dumps and downloads
//!
//! # Example
//!
//! ```rust,no_run
//! use report_e2e::config::Config;
//! use report_e2e::driver::{ChromeLauncher, ChromeOptions};
//! use report_e2e::harness::{SuiteConfig, run_suite};
//! use report_e2e::scenario::dashboard_scenarios;
//! use report_e2e::wait::SystemClock;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let launcher = ChromeLauncher::new(ChromeOptions::from_config(&config, "./downloads"));
//! let suite = SuiteConfig::from_config(&config);
//!
//! let report = run_suite(&launcher, &SystemClock, &suite, &dashboard_scenarios()).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod harness;
pub mod probe;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod wait;

// Re-export runner types
pub use runner::{ScenarioOutcome, SuiteReport};

// Re-export suite orchestration
pub use harness::{SuiteConfig, SuiteError, run_suite};

// Re-export probe
pub use probe::{ProbeAttempt, ProbeConfig, ProbeError, probe, probe_server};

// Re-export scenarios
pub use scenario::{Scenario, ScenarioError, dashboard_scenarios, run_scenario};

// Re-export driver traits and backends
pub use driver::{
    BrowserDriver, BrowserLauncher, ChromeLauncher, DriverError, MockLauncher, MockPage,
    PageDriver,
};

// Re-export session management
pub use session::{Session, cleanup_old_sessions, list_sessions};
