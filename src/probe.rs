//! Availability probe.
//!
//! Before any scenario runs, the dashboard is loaded in a throwaway browser
//! session until it answers. The policy is a bounded linear retry: a fixed
//! delay after each failed attempt and a hard cap on attempts. Running out
//! of attempts is fatal for the whole suite.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::driver::{BrowserLauncher, DriverError, PageDriver};
use crate::wait::Clock;

/// Session label used for the probe's private browser
pub const PROBE_SESSION: &str = "probe";

/// Probe parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// URL that must load
    pub url: String,
    /// Attempt cap (must be at least 1)
    pub max_attempts: u32,
    /// Pause after each failed attempt
    pub delay: Duration,
    /// Budget for the whole probe, delays included
    pub setup_timeout: Duration,
}

impl ProbeConfig {
    pub fn new(url: impl Into<String>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            url: url.into(),
            max_attempts,
            delay,
            setup_timeout: Duration::from_millis(crate::config::DEFAULT_SETUP_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.target.base_url.clone(),
            max_attempts: config.probe.max_attempts,
            delay: config.probe.delay,
            setup_timeout: config.probe.setup_timeout,
        }
    }

    pub fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }
}

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success,
    Failure { error: String },
}

/// One load attempt against the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    pub outcome: ProbeOutcome,
    /// Delay taken before the next attempt, in milliseconds
    pub delay_after_ms: Option<u64>,
}

impl ProbeAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == ProbeOutcome::Success
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("attempt cap must be at least 1")]
    InvalidConfig,

    #[error("Server at {url} was not accessible after {attempts} attempts (last error: {last_error})")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
        history: Vec<ProbeAttempt>,
    },

    #[error("Server at {url} was not accessible within the {timeout:?} setup budget")]
    SetupTimeout { url: String, timeout: Duration },

    #[error("probe session failed: {0}")]
    Session(#[from] DriverError),
}

/// Load `config.url` on `page` until it succeeds or the attempt cap is hit.
///
/// Returns the attempt history on success. Every failed attempt except the
/// last is followed by exactly one `config.delay` sleep on `clock`.
pub async fn probe(
    page: &dyn PageDriver,
    clock: &dyn Clock,
    config: &ProbeConfig,
) -> Result<Vec<ProbeAttempt>, ProbeError> {
    if config.max_attempts == 0 {
        return Err(ProbeError::InvalidConfig);
    }

    let mut history = Vec::with_capacity(config.max_attempts as usize);
    let mut last_error = String::new();

    for attempt in 1..=config.max_attempts {
        match page.goto(&config.url).await {
            Ok(()) => {
                info!(url = %config.url, attempt, "Server is accessible.");
                history.push(ProbeAttempt {
                    attempt,
                    outcome: ProbeOutcome::Success,
                    delay_after_ms: None,
                });
                return Ok(history);
            }
            Err(err) => {
                let is_last = attempt == config.max_attempts;
                if is_last {
                    warn!(url = %config.url, error = %err, "Server not accessible ({}/{})", attempt, config.max_attempts);
                } else {
                    warn!(url = %config.url, error = %err, "Server not accessible, retrying ({}/{})...", attempt, config.max_attempts);
                }

                last_error = err.to_string();
                history.push(ProbeAttempt {
                    attempt,
                    outcome: ProbeOutcome::Failure {
                        error: last_error.clone(),
                    },
                    delay_after_ms: (!is_last).then(|| config.delay.as_millis() as u64),
                });

                if !is_last {
                    clock.sleep(config.delay).await;
                }
            }
        }
    }

    Err(ProbeError::Exhausted {
        url: config.url.clone(),
        attempts: config.max_attempts,
        last_error,
        history,
    })
}

/// Run [`probe`] in its own browser session, bounded by `config.setup_timeout`.
///
/// The session is closed before returning, whatever the outcome.
pub async fn probe_server(
    launcher: &dyn BrowserLauncher,
    clock: &dyn Clock,
    config: &ProbeConfig,
) -> Result<Vec<ProbeAttempt>, ProbeError> {
    let browser = launcher.launch(PROBE_SESSION).await?;

    let result: Result<Vec<ProbeAttempt>, ProbeError> = async {
        let page = browser.new_page().await?;
        tokio::time::timeout(config.setup_timeout, probe(&*page, clock, config))
            .await
            .map_err(|_| ProbeError::SetupTimeout {
                url: config.url.clone(),
                timeout: config.setup_timeout,
            })?
    }
    .await;

    if let Err(e) = browser.close().await {
        warn!(session = PROBE_SESSION, "Error closing probe browser: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockLauncher, MockPage};
    use crate::wait::{ManualClock, SystemClock};
    use pretty_assertions::assert_eq;

    const URL: &str = "http://localhost:3000";

    fn config(max_attempts: u32) -> ProbeConfig {
        ProbeConfig::new(URL, max_attempts, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_attempt_success_takes_no_delay() {
        let page = MockPage::new();
        let clock = ManualClock::new();

        let history = probe(&page, &clock, &config(6)).await.unwrap();

        assert_eq!(history.len(), 1);
        assert!(history[0].succeeded());
        assert_eq!(page.loads(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_success_on_attempt_k_stops_retrying() {
        let page = MockPage::new().failing_loads(3);
        let clock = ManualClock::new();

        let history = probe(&page, &clock, &config(6)).await.unwrap();

        assert_eq!(page.loads(), 4);
        assert_eq!(history.len(), 4);
        assert!(history[3].succeeded());
        assert_eq!(history[0].delay_after_ms, Some(5000));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 3]);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal_and_capped() {
        let page = MockPage::new().unreachable();
        let clock = ManualClock::new();

        let err = probe(&page, &clock, &config(6)).await.unwrap_err();

        assert_eq!(page.loads(), 6);
        // one delay between each pair of attempts, none after the last
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 5]);
        match err {
            ProbeError::Exhausted {
                attempts, history, ..
            } => {
                assert_eq!(attempts, 6);
                assert_eq!(history.len(), 6);
                assert!(history.iter().all(|a| !a.succeeded()));
                assert_eq!(history[5].delay_after_ms, None);
            }
            other => panic!("expected exhaustion, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_success_on_last_attempt() {
        let page = MockPage::new().failing_loads(5);
        let clock = ManualClock::new();

        let history = probe(&page, &clock, &config(6)).await.unwrap();
        assert_eq!(history.len(), 6);
        assert_eq!(clock.sleeps().len(), 5);
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let page = MockPage::new();
        let err = probe(&page, &ManualClock::new(), &config(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidConfig));
        assert_eq!(page.loads(), 0);
    }

    #[tokio::test]
    async fn test_probe_server_uses_own_session() {
        let launcher = MockLauncher::new(MockPage::new).failing_loads(1);
        let history = probe_server(&launcher, &ManualClock::new(), &config(6))
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(launcher.launches(), vec![PROBE_SESSION.to_string()]);
        assert_eq!(launcher.pages_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_server_setup_budget() {
        let launcher = MockLauncher::new(MockPage::new).unreachable();
        let config = config(6).setup_timeout(Duration::from_secs(12));

        let err = probe_server(&launcher, &SystemClock, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::SetupTimeout { .. }), "{err}");
    }
}
