//! Configuration management with environment variable support.
//!
//! Every knob has a default matching the dashboard's reference run, and can be
//! overridden through the environment (and, for the binary, through CLI flags).
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REPORT_E2E_BASE_URL` | Dashboard URL under test | `http://localhost:3000` |
//! | `REPORT_E2E_PROBE_ATTEMPTS` | Availability probe attempt cap | `6` |
//! | `REPORT_E2E_PROBE_DELAY_MS` | Delay between probe attempts (ms) | `5000` |
//! | `REPORT_E2E_SETUP_TIMEOUT_MS` | Budget for the whole probe phase (ms) | `60000` |
//! | `REPORT_E2E_TEST_TIMEOUT_MS` | Budget for a single scenario (ms) | `90000` |
//! | `REPORT_E2E_NAV_TIMEOUT_MS` | Navigation + network idle budget (ms) | `30000` |
//! | `REPORT_E2E_HEADLESS` | Run Chrome headless | `true` |
//! | `REPORT_E2E_ARTIFACT_DIR` | Base directory for run sessions | `./e2e-artifacts` |
//! | `REPORT_E2E_CHROME` | Chrome/Chromium executable | auto-detect |
//!
//! # Example
//!
//! ```bash
//! export REPORT_E2E_BASE_URL="http://127.0.0.1:8080"
//! export REPORT_E2E_PROBE_ATTEMPTS=10
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default dashboard URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default number of availability probe attempts
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 6;

/// Default delay between probe attempts (milliseconds)
pub const DEFAULT_PROBE_DELAY_MS: u64 = 5_000;

/// Default budget for the probe phase (milliseconds)
pub const DEFAULT_SETUP_TIMEOUT_MS: u64 = 60_000;

/// Default budget for one scenario (milliseconds)
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 90_000;

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

/// Default poll interval for readiness waits (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Quiet window with no new network activity that counts as "idle" (milliseconds)
pub const DEFAULT_NETWORK_IDLE_MS: u64 = 500;

/// Default artifact base directory
pub const DEFAULT_ARTIFACT_DIR: &str = "./e2e-artifacts";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_BASE_URL: &str = "REPORT_E2E_BASE_URL";
pub const ENV_PROBE_ATTEMPTS: &str = "REPORT_E2E_PROBE_ATTEMPTS";
pub const ENV_PROBE_DELAY_MS: &str = "REPORT_E2E_PROBE_DELAY_MS";
pub const ENV_SETUP_TIMEOUT_MS: &str = "REPORT_E2E_SETUP_TIMEOUT_MS";
pub const ENV_TEST_TIMEOUT_MS: &str = "REPORT_E2E_TEST_TIMEOUT_MS";
pub const ENV_NAV_TIMEOUT_MS: &str = "REPORT_E2E_NAV_TIMEOUT_MS";
pub const ENV_HEADLESS: &str = "REPORT_E2E_HEADLESS";
pub const ENV_ARTIFACT_DIR: &str = "REPORT_E2E_ARTIFACT_DIR";
pub const ENV_CHROME: &str = "REPORT_E2E_CHROME";

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for a suite run
#[derive(Debug, Clone)]
pub struct Config {
    /// Target server settings
    pub target: TargetSettings,
    /// Availability probe settings
    pub probe: ProbeSettings,
    /// Per-scenario timing
    pub timeouts: TimeoutSettings,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Where diagnostic artifacts go
    pub artifacts: ArtifactSettings,
}

#[derive(Debug, Clone)]
pub struct TargetSettings {
    /// Dashboard URL loaded by the probe and every scenario
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Attempt cap (always at least 1)
    pub max_attempts: u32,
    /// Fixed delay after each failed attempt
    pub delay: Duration,
    /// Budget for the whole probe phase
    pub setup_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    /// Budget for one scenario, start to finish
    pub test: Duration,
    /// Budget for navigation plus network idle
    pub navigation: Duration,
    /// Poll interval used by readiness waits
    pub poll_interval: Duration,
    /// Quiet window that counts as network idle
    pub network_idle: Duration,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Explicit browser executable; auto-detected when `None`
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ArtifactSettings {
    /// Base directory holding one session directory per run
    pub base_dir: PathBuf,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            target: TargetSettings::from_env(),
            probe: ProbeSettings::from_env(),
            timeouts: TimeoutSettings::from_env(),
            browser: BrowserSettings::from_env(),
            artifacts: ArtifactSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            target: TargetSettings::defaults(),
            probe: ProbeSettings::defaults(),
            timeouts: TimeoutSettings::defaults(),
            browser: BrowserSettings::defaults(),
            artifacts: ArtifactSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TargetSettings {
    pub fn from_env() -> Self {
        Self {
            base_url: base_url_or_default(env::var(ENV_BASE_URL).ok()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ProbeSettings {
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_parse(ENV_PROBE_ATTEMPTS)
                .unwrap_or(DEFAULT_PROBE_ATTEMPTS)
                .max(1),
            delay: Duration::from_millis(
                env_parse(ENV_PROBE_DELAY_MS).unwrap_or(DEFAULT_PROBE_DELAY_MS),
            ),
            setup_timeout: Duration::from_millis(
                env_parse(ENV_SETUP_TIMEOUT_MS).unwrap_or(DEFAULT_SETUP_TIMEOUT_MS),
            ),
        }
    }

    pub fn defaults() -> Self {
        Self {
            max_attempts: DEFAULT_PROBE_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_PROBE_DELAY_MS),
            setup_timeout: Duration::from_millis(DEFAULT_SETUP_TIMEOUT_MS),
        }
    }
}

impl TimeoutSettings {
    pub fn from_env() -> Self {
        Self {
            test: Duration::from_millis(
                env_parse(ENV_TEST_TIMEOUT_MS).unwrap_or(DEFAULT_TEST_TIMEOUT_MS),
            ),
            navigation: Duration::from_millis(
                env_parse(ENV_NAV_TIMEOUT_MS).unwrap_or(DEFAULT_NAV_TIMEOUT_MS),
            ),
            ..Self::defaults()
        }
    }

    pub fn defaults() -> Self {
        Self {
            test: Duration::from_millis(DEFAULT_TEST_TIMEOUT_MS),
            navigation: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            network_idle: Duration::from_millis(DEFAULT_NETWORK_IDLE_MS),
        }
    }
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        Self {
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            executable: env::var(ENV_CHROME).ok().map(PathBuf::from),
        }
    }

    pub fn defaults() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

impl ArtifactSettings {
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_ARTIFACT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
        }
    }

    pub fn defaults() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse the usual spellings of a boolean flag
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A blank or missing URL means the default
fn base_url_or_default(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Get the artifact base directory (convenience function)
pub fn artifact_dir() -> PathBuf {
    get().artifacts.base_dir.clone()
}
