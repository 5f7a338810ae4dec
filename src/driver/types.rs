use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Attachment and visibility of the first element matching a selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Present in the DOM
    pub attached: bool,

    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
}

impl ElementState {
    pub const DETACHED: Self = Self {
        attached: false,
        visible: false,
    };

    pub const HIDDEN: Self = Self {
        attached: true,
        visible: false,
    };

    pub const VISIBLE: Self = Self {
        attached: true,
        visible: true,
    };
}

/// A file download triggered by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// URL the download was fetched from
    pub url: Option<String>,

    /// Filename proposed by the page
    pub suggested_filename: String,

    /// Local path of the completed file (None if it could not be resolved)
    pub path: Option<PathBuf>,
}

/// An armed download subscription. Resolves with the first download the page starts.
pub type DownloadWatch = BoxFuture<'static, DriverResult<Download>>;

/// One browser tab.
///
/// Operations are the handful the probe and scenarios need; they are not
/// meant as a general automation surface.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the network is idle
    async fn goto(&self, url: &str) -> DriverResult<()>;

    /// Current `location.href`
    async fn current_url(&self) -> DriverResult<String>;

    /// Serialized page markup
    async fn content(&self) -> DriverResult<String>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    async fn element_state(&self, selector: &str) -> DriverResult<ElementState>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> DriverResult<usize>;

    /// Choose `value` in a `<select>` and fire its input/change events
    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()>;

    async fn click(&self, selector: &str) -> DriverResult<()>;

    /// Subscribe to the next download. The subscription is live once this returns.
    async fn watch_download(&self) -> DriverResult<DownloadWatch>;

    /// Console errors logged by the page since the last call
    async fn take_console_errors(&self) -> DriverResult<Vec<String>>;

    async fn is_visible(&self, selector: &str) -> DriverResult<bool> {
        Ok(self.element_state(selector).await?.visible)
    }
}

/// A running browser that hands out pages.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>>;

    /// Shut the browser down. Pages become unusable.
    async fn close(&self) -> DriverResult<()>;
}

/// Starts browser sessions.
///
/// The probe and the scenarios each get their own session.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// `label` names the session in logs and artifact paths
    async fn launch(&self, label: &str) -> DriverResult<Box<dyn BrowserDriver>>;
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Error types for driver operations
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("no element matches {0}")]
    ElementNotFound(String),

    #[error("{selector} has no option with value {value:?}")]
    OptionNotFound { selector: String, value: String },

    #[error("browser session closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
