use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::artifacts::ArtifactConfig;
use crate::config::Config;
use crate::driver::DriverError;
use crate::probe::{ProbeConfig, ProbeError};
use crate::runner::{EXIT_SETUP, EXIT_FAILED};

/// Session label for the browser shared by the scenarios
pub const SCENARIO_SESSION: &str = "scenarios";

/// Configuration for a suite run
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Availability probe settings; its URL is the one scenarios load
    pub probe: ProbeConfig,

    /// Budget for each scenario, end to end
    pub test_timeout: Duration,

    /// Poll interval for readiness waits
    pub poll_interval: Duration,

    /// Debug capture settings; `None` disables captures
    pub artifacts: Option<ArtifactConfig>,
}

impl SuiteConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe: ProbeConfig::from_config(config),
            test_timeout: config.timeouts.test,
            poll_interval: config.timeouts.poll_interval,
            artifacts: None,
        }
    }

    /// Write debug captures under `dir`
    pub fn artifacts_in(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(ArtifactConfig {
            output_dir: dir.into(),
            include_manifest: true,
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.probe.url
    }
}

/// Errors that stop the suite before any scenario reports
#[derive(Debug, Error)]
pub enum SuiteError {
    /// The server never became reachable
    #[error("setup failed: {0}")]
    Setup(#[from] ProbeError),

    /// The scenario browser could not be started
    #[error("could not start the scenario browser: {0}")]
    Launch(#[source] DriverError),
}

impl SuiteError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SuiteError::Setup(_) => EXIT_SETUP,
            SuiteError::Launch(_) => EXIT_FAILED,
        }
    }
}
