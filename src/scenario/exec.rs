//! The load → wait → check → act → assert sequence shared by every scenario.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{
    Expectation, Interaction, ReadinessWait, Scenario, ScenarioError, ScenarioResult,
};
use crate::artifacts::{self, Artifact, ArtifactConfig};
use crate::driver::{Download, PageDriver};
use crate::runner::ScenarioOutcome;
use crate::wait::{Clock, WaitConfig, race_event_with_action, wait_for};

/// Everything a scenario needs besides its page
#[derive(Clone, Copy)]
pub struct ScenarioContext<'a> {
    /// Dashboard URL to load
    pub base_url: &'a str,
    pub clock: &'a dyn Clock,
    /// Poll interval for readiness and URL waits
    pub poll_interval: Duration,
    /// Budget for the whole scenario
    pub test_timeout: Duration,
    /// Where to write debug captures; `None` skips them
    pub artifacts: Option<&'a ArtifactConfig>,
}

/// Run `scenario` on `page` and report how it went.
///
/// Never panics or propagates: every failure becomes a failed outcome.
pub async fn run_scenario(
    page: &dyn PageDriver,
    scenario: &Scenario,
    ctx: ScenarioContext<'_>,
) -> ScenarioOutcome {
    let started = tokio::time::Instant::now();
    let mut collected = Vec::new();

    let result = match tokio::time::timeout(
        ctx.test_timeout,
        execute(page, scenario, ctx, &mut collected),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ScenarioError::Timeout(ctx.test_timeout)),
    };

    let elapsed = started.elapsed();
    match &result {
        Ok(()) => info!(scenario = %scenario.name, ?elapsed, "passed"),
        Err(err) => warn!(scenario = %scenario.name, ?elapsed, "failed: {}", err),
    }

    ScenarioOutcome::from_result(scenario, result, elapsed, collected)
}

/// The scenario body. Artifacts are pushed into `collected` as they are written.
pub async fn execute(
    page: &dyn PageDriver,
    scenario: &Scenario,
    ctx: ScenarioContext<'_>,
    collected: &mut Vec<Artifact>,
) -> ScenarioResult<()> {
    page.goto(ctx.base_url)
        .await
        .map_err(ScenarioError::driver("navigation"))?;

    wait_ready(page, &scenario.readiness, &ctx).await?;

    if let Some(config) = ctx.artifacts {
        match artifacts::capture_debug(page, &scenario.name, config).await {
            Ok(written) => collected.extend(written),
            Err(e) => warn!(scenario = %scenario.name, "Debug capture skipped: {}", e),
        }
    }

    wait_ready(page, &scenario.control, &ctx).await?;

    let visible = page
        .is_visible(&scenario.control.selector)
        .await
        .map_err(ScenarioError::driver("visibility check"))?;
    if !visible {
        return Err(ScenarioError::AssertionFailed(format!(
            "{} is not visible",
            scenario.control.selector
        )));
    }

    let download = interact(page, &scenario.interaction).await?;

    for message in page.take_console_errors().await.unwrap_or_default() {
        warn!(scenario = %scenario.name, "Console error: {}", message);
    }

    check(page, scenario, &ctx, download, collected).await
}

async fn wait_ready(
    page: &dyn PageDriver,
    wait: &ReadinessWait,
    ctx: &ScenarioContext<'_>,
) -> ScenarioResult<()> {
    let selector = wait.selector.as_str();
    let state = wait.state;
    debug!(selector, %state, timeout = ?wait.timeout, "Waiting for element");

    wait_for(
        ctx.clock,
        WaitConfig::new(wait.timeout, ctx.poll_interval),
        &wait.describe(),
        || async move {
            page.element_state(selector)
                .await
                .map(|s| state.satisfied_by(s))
        },
    )
    .await?;
    Ok(())
}

async fn interact(
    page: &dyn PageDriver,
    interaction: &Interaction,
) -> ScenarioResult<Option<Download>> {
    match interaction {
        Interaction::None => Ok(None),

        Interaction::SelectOption { selector, value } => {
            page.select_option(selector, value)
                .await
                .map_err(ScenarioError::driver("select option"))?;
            debug!(selector = %selector, value = %value, "Selected option");
            Ok(None)
        }

        Interaction::ClickForDownload { selector, timeout } => {
            let watch = page
                .watch_download()
                .await
                .map_err(ScenarioError::driver("download subscription"))?;
            let download =
                race_event_with_action(*timeout, "download event", watch, page.click(selector))
                    .await?;
            Ok(Some(download))
        }
    }
}

async fn check(
    page: &dyn PageDriver,
    scenario: &Scenario,
    ctx: &ScenarioContext<'_>,
    download: Option<Download>,
    collected: &mut Vec<Artifact>,
) -> ScenarioResult<()> {
    match &scenario.expectation {
        Expectation::UrlContains { fragment, timeout } => {
            let fragment = fragment.as_str();
            wait_for(
                ctx.clock,
                WaitConfig::new(*timeout, ctx.poll_interval),
                &format!("URL to contain {fragment}"),
                || async move { page.current_url().await.map(|url| url.contains(fragment)) },
            )
            .await?;

            let url = page
                .current_url()
                .await
                .map_err(ScenarioError::driver("read URL"))?;
            if !url.contains(fragment) {
                return Err(ScenarioError::AssertionFailed(format!(
                    "expected URL to contain {fragment}, got {url}"
                )));
            }
            Ok(())
        }

        Expectation::CountAtLeastOne { selector } => {
            let count = page
                .count(selector)
                .await
                .map_err(ScenarioError::driver("count"))?;
            info!(scenario = %scenario.name, selector = %selector, "Rows found: {}", count);
            if count == 0 {
                return Err(ScenarioError::AssertionFailed(format!(
                    "expected at least one {selector}, found 0"
                )));
            }
            Ok(())
        }

        Expectation::DownloadHasPath => {
            let Some(download) = download else {
                return Err(ScenarioError::AssertionFailed(
                    "no download was captured".to_string(),
                ));
            };
            let Some(path) = download.path.as_ref().filter(|p| p.exists()) else {
                return Err(ScenarioError::AssertionFailed(format!(
                    "download {} has no local path",
                    download.suggested_filename
                )));
            };
            info!(scenario = %scenario.name, "Downloaded PDF path: {}", path.display());

            if let Some(config) = ctx.artifacts {
                match artifacts::record_download(&download, &scenario.name, config) {
                    Ok(Some(artifact)) => collected.push(artifact),
                    Ok(None) => {}
                    Err(e) => warn!(scenario = %scenario.name, "Download manifest skipped: {}", e),
                }
            }
            Ok(())
        }
    }
}
