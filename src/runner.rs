//! Types for suite run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::artifacts::Artifact;
use crate::probe::ProbeAttempt;
use crate::scenario::{Scenario, ScenarioResult};

/// Exit code for a run where every scenario passed
pub const EXIT_PASSED: i32 = 0;
/// Exit code when at least one scenario failed
pub const EXIT_FAILED: i32 = 1;
/// Exit code when the server never became reachable
pub const EXIT_SETUP: i32 = 2;

/// Result of a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario identifier
    pub name: String,

    /// One-line summary
    pub title: String,

    pub passed: bool,

    /// Failure message if the scenario failed
    pub error: Option<String>,

    /// Whether the failure was a timeout (readiness, event, or overall budget)
    pub timed_out: bool,

    /// Wall time spent, in milliseconds
    pub elapsed_ms: u64,

    /// Debug captures and downloads written during the run
    pub artifacts: Vec<Artifact>,
}

impl ScenarioOutcome {
    pub fn from_result(
        scenario: &Scenario,
        result: ScenarioResult<()>,
        elapsed: Duration,
        artifacts: Vec<Artifact>,
    ) -> Self {
        let (passed, error, timed_out) = match result {
            Ok(()) => (true, None, false),
            Err(err) => (false, Some(err.to_string()), err.is_timeout()),
        };
        Self {
            name: scenario.name.clone(),
            title: scenario.title.clone(),
            passed,
            error,
            timed_out,
            elapsed_ms: elapsed.as_millis() as u64,
            artifacts,
        }
    }

    /// Failed outcome for a scenario that never got a page
    pub fn not_started(scenario: &Scenario, error: impl Into<String>) -> Self {
        Self {
            name: scenario.name.clone(),
            title: scenario.title.clone(),
            passed: false,
            error: Some(error.into()),
            timed_out: false,
            elapsed_ms: 0,
            artifacts: Vec::new(),
        }
    }
}

/// Result of a complete suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Dashboard URL under test
    pub base_url: String,

    pub started_at: DateTime<Utc>,

    /// Probe attempts made before the scenarios ran
    pub probe: Vec<ProbeAttempt>,

    /// One entry per scenario, in declaration order
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// True if every scenario passed
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() { EXIT_PASSED } else { EXIT_FAILED }
    }

    /// Plain-text summary, one line per scenario
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.outcomes.len() + 1);
        for outcome in &self.outcomes {
            let mark = if outcome.passed { "PASS" } else { "FAIL" };
            let mut line = format!(
                "{} {} ({} ms) {}",
                mark, outcome.name, outcome.elapsed_ms, outcome.title
            );
            if let Some(err) = &outcome.error {
                line.push_str(&format!("\n     {}", err));
            }
            lines.push(line);
        }
        let passed = self.outcomes.iter().filter(|o| o.passed).count();
        lines.push(format!("{}/{} scenarios passed", passed, self.outcomes.len()));
        lines.join("\n")
    }
}
