use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::driver::{DriverError, ElementState};
use crate::wait::{RaceError, WaitTimeout};

/// State an element must reach before a scenario proceeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Present in the DOM
    Attached,
    /// Present and rendered
    Visible,
}

impl Readiness {
    pub fn satisfied_by(&self, state: ElementState) -> bool {
        match self {
            Readiness::Attached => state.attached,
            Readiness::Visible => state.attached && state.visible,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Attached => write!(f, "attached"),
            Readiness::Visible => write!(f, "visible"),
        }
    }
}

/// Wait until `selector` reaches `state`, within `timeout`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessWait {
    pub selector: String,
    pub state: Readiness,
    pub timeout: Duration,
}

impl ReadinessWait {
    pub fn attached(selector: &str, timeout: Duration) -> Self {
        Self {
            selector: selector.to_string(),
            state: Readiness::Attached,
            timeout,
        }
    }

    pub fn visible(selector: &str, timeout: Duration) -> Self {
        Self {
            selector: selector.to_string(),
            state: Readiness::Visible,
            timeout,
        }
    }

    /// Human-readable condition, used in timeout messages
    pub fn describe(&self) -> String {
        format!("{} to be {}", self.selector, self.state)
    }
}

/// The single user action a scenario performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Only observe the page
    None,

    /// Choose `value` in the `<select>` at `selector`
    SelectOption { selector: String, value: String },

    /// Click `selector` while waiting up to `timeout` for the download it starts
    ClickForDownload { selector: String, timeout: Duration },
}

/// What must hold after the interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// `location.href` comes to contain `fragment` within `timeout`
    UrlContains { fragment: String, timeout: Duration },

    /// At least one element matches `selector`
    CountAtLeastOne { selector: String },

    /// The download has a local path that exists
    DownloadHasPath,
}

/// One independent end-to-end check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Short identifier, used for filtering and artifact names
    pub name: String,

    /// One-line summary shown in reports
    pub title: String,

    /// Page-level signal that rendering has started
    pub readiness: ReadinessWait,

    /// The control the scenario exercises; must end up visible
    pub control: ReadinessWait,

    pub interaction: Interaction,

    pub expectation: Expectation,
}

/// Result type for scenario execution
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Why a scenario failed. Each variant keeps the originating condition.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A readiness, URL or event wait ran out of time
    #[error(transparent)]
    Wait(#[from] WaitTimeout),

    /// An observed value did not match
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// The browser could not perform a step
    #[error("{step} failed: {source}")]
    Driver {
        step: &'static str,
        #[source]
        source: DriverError,
    },

    /// The scenario as a whole overran its budget
    #[error("scenario exceeded its {0:?} budget")]
    Timeout(Duration),
}

impl ScenarioError {
    pub fn driver(step: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| ScenarioError::Driver { step, source }
    }

    /// True for the timeout family (readiness, event absence, overall budget)
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScenarioError::Wait(_) | ScenarioError::Timeout(_))
    }
}

impl From<RaceError<DriverError>> for ScenarioError {
    fn from(err: RaceError<DriverError>) -> Self {
        match err {
            RaceError::Timeout(timeout) => ScenarioError::Wait(timeout),
            RaceError::Action(source) => ScenarioError::Driver {
                step: "click",
                source,
            },
            RaceError::Event(source) => ScenarioError::Driver {
                step: "download",
                source,
            },
        }
    }
}
