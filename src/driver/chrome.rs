//! Chrome/Chromium backend over the DevTools protocol.
//!
//! Network idle is approximated the way most CDP tooling does it: the
//! document must report `readyState == "complete"` and the number of
//! resource-timing entries must stay unchanged for a quiet window.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, EventDownloadProgress, EventDownloadWillBegin, SetDownloadBehaviorBehavior,
    SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{
    BrowserDriver, BrowserLauncher, Download, DownloadWatch, DriverError, DriverResult,
    ElementState, PageDriver,
};
use crate::config::Config;

impl From<CdpError> for DriverError {
    fn from(err: CdpError) -> Self {
        DriverError::Protocol(err.to_string())
    }
}

/// Launch and page settings for the Chrome backend
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    /// Run without a window
    pub headless: bool,
    /// Explicit executable; chromiumoxide auto-detects when `None`
    pub executable: Option<PathBuf>,
    /// Budget for navigation plus network idle
    pub navigation_timeout: Duration,
    /// Quiet window that counts as network idle
    pub network_idle: Duration,
    /// Poll interval while waiting for idle
    pub poll_interval: Duration,
    /// Where downloads are written
    pub download_dir: PathBuf,
    /// Viewport size
    pub window_size: (u32, u32),
}

impl ChromeOptions {
    pub fn from_config(config: &Config, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            headless: config.browser.headless,
            executable: config.browser.executable.clone(),
            navigation_timeout: config.timeouts.navigation,
            network_idle: config.timeouts.network_idle,
            poll_interval: config.timeouts.poll_interval,
            download_dir: download_dir.into(),
            window_size: (1280, 720),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }
}

/// Starts one Chrome process per session.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    options: ChromeOptions,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChromeOptions {
        &self.options
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, label: &str) -> DriverResult<Box<dyn BrowserDriver>> {
        let browser = ChromeBrowser::launch(self.options.clone(), label).await?;
        Ok(Box::new(browser))
    }
}

/// A running Chrome process and its CDP handler task.
///
/// Every page gets its own browser context (separate cookies, storage and
/// cache). The profile directory is private to this process and removed on drop.
pub struct ChromeBrowser {
    browser: tokio::sync::Mutex<Browser>,
    handler: JoinHandle<()>,
    options: ChromeOptions,
    label: String,
    contexts: Mutex<Vec<BrowserContextId>>,
    profile: TempDir,
}

impl ChromeBrowser {
    pub async fn launch(options: ChromeOptions, label: &str) -> DriverResult<Self> {
        info!(session = label, headless = options.headless, "Launching Chrome");

        let profile = tempfile::Builder::new()
            .prefix(&format!("report-e2e-{}-", label))
            .tempdir()?;
        let (width, height) = options.window_size;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(width, height)
            .user_data_dir(profile.path());
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let session = label.to_string();
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!(session = %session, "CDP handler event loop ended");
                    break;
                }
            }
        });

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            handler,
            options,
            label: label.to_string(),
            contexts: Mutex::new(Vec::new()),
            profile,
        })
    }

    /// Profile directory used by this browser
    pub fn profile_dir(&self) -> &std::path::Path {
        self.profile.path()
    }

    /// Number of isolated contexts opened so far
    pub fn context_count(&self) -> usize {
        self.contexts.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserDriver for ChromeBrowser {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        let (page, context) = {
            let mut browser = self.browser.lock().await;
            let context = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await?;
            if let Ok(mut contexts) = self.contexts.lock() {
                contexts.push(context.clone());
            }

            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context.clone())
                .build()
                .map_err(DriverError::Protocol)?;
            (browser.new_page(target).await?, context)
        };
        let page = ChromePage::attach(page, Some(context), self.options.clone()).await?;
        Ok(Box::new(page))
    }

    async fn close(&self) -> DriverResult<()> {
        let mut browser = self.browser.lock().await;

        let contexts = self
            .contexts
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        for context in contexts {
            if let Err(e) = browser.dispose_browser_context(context).await {
                debug!(session = %self.label, "Error disposing browser context: {}", e);
            }
        }

        if let Err(e) = browser.close().await {
            warn!(session = %self.label, "Error closing browser: {}", e);
        }
        browser.wait().await?;
        self.handler.abort();
        debug!(session = %self.label, "Browser shut down");
        Ok(())
    }
}

/// One Chrome tab with download and console hooks installed.
pub struct ChromePage {
    page: Page,
    options: ChromeOptions,
    console_errors: Arc<Mutex<Vec<String>>>,
    console_task: JoinHandle<()>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkSnapshot {
    ready_state: String,
    resources: usize,
}

const NETWORK_SNAPSHOT_JS: &str = "({ readyState: document.readyState, \
     resources: performance.getEntriesByType('resource').length })";

impl ChromePage {
    /// Install download and console hooks on `page`, which lives in `context`
    /// (`None` for the default context).
    pub async fn attach(
        page: Page,
        context: Option<BrowserContextId>,
        options: ChromeOptions,
    ) -> DriverResult<Self> {
        std::fs::create_dir_all(&options.download_dir)?;

        let mut behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(options.download_dir.to_string_lossy().to_string())
            .events_enabled(true);
        if let Some(context) = context {
            behavior = behavior.browser_context_id(context);
        }
        let behavior = behavior.build().map_err(DriverError::Protocol)?;
        page.execute(behavior).await?;

        let console_errors = Arc::new(Mutex::new(Vec::new()));
        let mut console = page.event_listener::<EventConsoleApiCalled>().await?;
        let sink = Arc::clone(&console_errors);
        let console_task = tokio::spawn(async move {
            while let Some(event) = console.next().await {
                if enum_name(&event.r#type).as_deref() != Some("error") {
                    continue;
                }
                let text = event
                    .args
                    .iter()
                    .map(|arg| match (&arg.value, &arg.description) {
                        (Some(serde_json::Value::String(s)), _) => s.clone(),
                        (Some(value), _) => value.to_string(),
                        (None, Some(description)) => description.clone(),
                        (None, None) => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Ok(mut errors) = sink.lock() {
                    errors.push(text);
                }
            }
        });

        Ok(Self {
            page,
            options,
            console_errors,
            console_task,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> DriverResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn wait_network_idle(&self) -> DriverResult<()> {
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let snapshot: NetworkSnapshot = self.eval(NETWORK_SNAPSHOT_JS).await?;
            if snapshot.ready_state == "complete" {
                if last_count == Some(snapshot.resources) {
                    if quiet_since.elapsed() >= self.options.network_idle {
                        return Ok(());
                    }
                } else {
                    last_count = Some(snapshot.resources);
                    quiet_since = Instant::now();
                }
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.console_task.abort();
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            // Chrome swaps in an internal error page instead of failing the load
            let landed = self.current_url().await?;
            if landed.starts_with("chrome-error://") {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: "server did not respond".to_string(),
                });
            }

            self.wait_network_idle().await
        };

        tokio::time::timeout(self.options.navigation_timeout, navigation)
            .await
            .map_err(|_| DriverError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "network not idle after {:?}",
                    self.options.navigation_timeout
                ),
            })?
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.eval("window.location.href").await
    }

    async fn content(&self) -> DriverResult<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn element_state(&self, selector: &str) -> DriverResult<ElementState> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return {{ attached: false, visible: false }};
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                const visible = style.visibility !== 'hidden'
                    && style.display !== 'none'
                    && rect.width > 0 && rect.height > 0;
                return {{ attached: true, visible }};
            }})()"#,
            selector = js_string(selector),
        );
        self.eval(&script).await
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        self.eval(&script).await
    }

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return 'missing';
                const option = Array.from(el.options || [])
                    .find(o => o.value === {value} || o.label === {value});
                if (!option) return 'no-option';
                el.value = option.value;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            selector = js_string(selector),
            value = js_string(value),
        );

        match self.eval::<String>(&script).await?.as_str() {
            "ok" => Ok(()),
            "missing" => Err(DriverError::ElementNotFound(selector.to_string())),
            _ => Err(DriverError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
        }
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn watch_download(&self) -> DriverResult<DownloadWatch> {
        let mut begins = self.page.event_listener::<EventDownloadWillBegin>().await?;
        let mut progress = self.page.event_listener::<EventDownloadProgress>().await?;
        let download_dir = self.options.download_dir.clone();

        Ok(Box::pin(async move {
            let begin = begins.next().await.ok_or(DriverError::Closed)?;
            debug!(guid = %begin.guid, file = %begin.suggested_filename, "Download started");

            loop {
                let update = progress.next().await.ok_or(DriverError::Closed)?;
                if update.guid != begin.guid {
                    continue;
                }
                match enum_name(&update.state).as_deref() {
                    Some("completed") => break,
                    Some("canceled") => {
                        return Err(DriverError::Protocol(format!(
                            "download of {} was canceled",
                            begin.suggested_filename
                        )));
                    }
                    _ => {}
                }
            }

            let path = download_dir.join(&begin.guid);
            Ok(Download {
                url: Some(begin.url.clone()),
                suggested_filename: begin.suggested_filename.clone(),
                path: path.exists().then_some(path),
            })
        }))
    }

    async fn take_console_errors(&self) -> DriverResult<Vec<String>> {
        let mut errors = self
            .console_errors
            .lock()
            .map_err(|_| DriverError::Protocol("console buffer poisoned".to_string()))?;
        Ok(std::mem::take(&mut *errors))
    }
}

/// Quote a Rust string as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Wire name of a CDP enum value (e.g. `"completed"`)
fn enum_name<T: serde::Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}
