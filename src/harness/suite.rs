use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use super::types::{SCENARIO_SESSION, SuiteConfig, SuiteError};
use crate::driver::{BrowserDriver, BrowserLauncher};
use crate::probe::probe_server;
use crate::runner::{ScenarioOutcome, SuiteReport};
use crate::scenario::{Scenario, ScenarioContext, run_scenario};
use crate::wait::Clock;

/// Run the whole suite.
///
/// 1. Probe the server in its own browser session, closed before anything else starts.
/// 2. Launch one browser for the scenarios.
/// 3. Run every scenario concurrently, each on its own page and within its own budget.
///
/// Probe exhaustion is returned as [`SuiteError::Setup`] and no scenario page
/// is ever opened. Scenario failures never abort the others; they land in
/// the report.
pub async fn run_suite(
    launcher: &dyn BrowserLauncher,
    clock: &dyn Clock,
    config: &SuiteConfig,
    scenarios: &[Scenario],
) -> Result<SuiteReport, SuiteError> {
    let started_at = Utc::now();

    info!(url = %config.base_url(), "Checking server availability");
    let probe = probe_server(launcher, clock, &config.probe).await?;

    let browser = launcher
        .launch(SCENARIO_SESSION)
        .await
        .map_err(SuiteError::Launch)?;

    let ctx = ScenarioContext {
        base_url: config.base_url(),
        clock,
        poll_interval: config.poll_interval,
        test_timeout: config.test_timeout,
        artifacts: config.artifacts.as_ref(),
    };

    info!(count = scenarios.len(), "Running scenarios");
    let outcomes = join_all(
        scenarios
            .iter()
            .map(|scenario| run_on_fresh_page(&*browser, scenario, ctx)),
    )
    .await;

    if let Err(e) = browser.close().await {
        warn!(session = SCENARIO_SESSION, "Error closing browser: {}", e);
    }

    Ok(SuiteReport {
        base_url: config.base_url().to_string(),
        started_at,
        probe,
        outcomes,
    })
}

async fn run_on_fresh_page(
    browser: &dyn BrowserDriver,
    scenario: &Scenario,
    ctx: ScenarioContext<'_>,
) -> ScenarioOutcome {
    match browser.new_page().await {
        Ok(page) => run_scenario(&*page, scenario, ctx).await,
        Err(e) => {
            warn!(scenario = %scenario.name, "Could not open page: {}", e);
            ScenarioOutcome::not_started(scenario, format!("could not open page: {e}"))
        }
    }
}
