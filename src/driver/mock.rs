//! Scripted in-memory browser for testing.
//!
//! A [`MockPage`] holds a small table of selectors with their state and
//! match counts, plus scripted reactions to selections and clicks. Clones
//! share state, so a test can hand a page to the code under test and inspect
//! it afterwards.
//!
//! ```rust
//! use report_e2e::driver::{ElementState, MockEffect, MockPage};
//!
//! let page = MockPage::new()
//!     .element("#main-container", ElementState::VISIBLE)
//!     .select("select#device-filter", &["all", "mobile"])
//!     .on_select(
//!         "select#device-filter",
//!         "mobile",
//!         MockEffect::SetCount { selector: ".device-row.mobile".into(), count: 2 },
//!     );
//! assert_eq!(page.loads(), 0);
//! ```

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use super::types::{
    BrowserDriver, BrowserLauncher, Download, DownloadWatch, DriverError, DriverResult,
    ElementState, PageDriver,
};

/// Loads fail while this many failures remain; `usize::MAX` never recovers
const FOREVER: usize = usize::MAX;

/// Reaction to a scripted selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEffect {
    /// Add `key=value` to the current URL's query string
    AppendQuery { key: String, value: String },

    /// Change how many elements match `selector`
    SetCount { selector: String, count: usize },

    /// Change the state reported for `selector`
    SetState { selector: String, state: ElementState },
}

#[derive(Debug, Clone)]
struct MockElement {
    state: ElementState,
    /// Polls that still report the element as detached
    hidden_polls: usize,
}

#[derive(Debug, Clone)]
struct MockDownload {
    filename: String,
    dir: PathBuf,
}

#[derive(Debug)]
struct MockState {
    url: String,
    markup: String,
    outage: Arc<AtomicUsize>,
    loads: usize,
    elements: HashMap<String, MockElement>,
    counts: HashMap<String, usize>,
    options: HashMap<String, Vec<String>>,
    effects: Vec<(String, String, MockEffect)>,
    downloads: HashMap<String, MockDownload>,
    watcher: Option<oneshot::Sender<Download>>,
    console_errors: Vec<String>,
    clicks: Vec<String>,
    selections: Vec<(String, String)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            markup: "<html><head></head><body></body></html>".to_string(),
            outage: Arc::new(AtomicUsize::new(0)),
            loads: 0,
            elements: HashMap::new(),
            counts: HashMap::new(),
            options: HashMap::new(),
            effects: Vec::new(),
            downloads: HashMap::new(),
            watcher: None,
            console_errors: Vec::new(),
            clicks: Vec::new(),
            selections: Vec::new(),
        }
    }
}

/// A scripted page. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
}

impl MockPage {
    /// Blank page where every load succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// A page shaped like the report dashboard, downloads written to `download_dir`
    pub fn dashboard(download_dir: impl Into<PathBuf>) -> Self {
        Self::new()
            .markup(
                r#"<html><body><div id="main-container"><select id="date-filter"></select><select id="device-filter"></select><div id="chart"></div><table></table><button id="download-pdf">Download PDF</button></div></body></html>"#,
            )
            .element("body", ElementState::VISIBLE)
            .element("#main-container", ElementState::VISIBLE)
            .select("select#date-filter", &["", "2023-01-01", "2023-02-01"])
            .on_select(
                "select#date-filter",
                "2023-01-01",
                MockEffect::AppendQuery {
                    key: "date".to_string(),
                    value: "2023-01-01".to_string(),
                },
            )
            .select("select#device-filter", &["all", "mobile", "desktop"])
            .count(".device-row.mobile", 0)
            .on_select(
                "select#device-filter",
                "mobile",
                MockEffect::SetCount {
                    selector: ".device-row.mobile".to_string(),
                    count: 3,
                },
            )
            .element("#chart", ElementState::VISIBLE)
            .count(".table-row", 5)
            .element("button#download-pdf", ElementState::VISIBLE)
            .download_on_click("button#download-pdf", "report.pdf", download_dir)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the page from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Markup returned by `content()`
    pub fn markup(self, html: &str) -> Self {
        self.lock().markup = html.to_string();
        self
    }

    /// Register `selector` with a fixed state
    pub fn element(self, selector: &str, state: ElementState) -> Self {
        self.lock().elements.insert(
            selector.to_string(),
            MockElement {
                state,
                hidden_polls: 0,
            },
        );
        self
    }

    /// Register `selector`, reported as detached for the first `polls` state checks
    pub fn appears_after(self, selector: &str, state: ElementState, polls: usize) -> Self {
        self.lock().elements.insert(
            selector.to_string(),
            MockElement {
                state,
                hidden_polls: polls,
            },
        );
        self
    }

    /// Fix the match count for `selector`
    pub fn count(self, selector: &str, count: usize) -> Self {
        self.lock().counts.insert(selector.to_string(), count);
        self
    }

    /// Register a visible `<select>` with the given option values
    pub fn select(self, selector: &str, values: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.elements.insert(
                selector.to_string(),
                MockElement {
                    state: ElementState::VISIBLE,
                    hidden_polls: 0,
                },
            );
            state.options.insert(
                selector.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        self
    }

    /// Apply `effect` when `value` is selected in `selector`
    pub fn on_select(self, selector: &str, value: &str, effect: MockEffect) -> Self {
        self.lock()
            .effects
            .push((selector.to_string(), value.to_string(), effect));
        self
    }

    /// Clicking `selector` writes `dir/filename` and fires a download event
    pub fn download_on_click(
        self,
        selector: &str,
        filename: &str,
        dir: impl Into<PathBuf>,
    ) -> Self {
        self.lock().downloads.insert(
            selector.to_string(),
            MockDownload {
                filename: filename.to_string(),
                dir: dir.into(),
            },
        );
        self
    }

    /// The next `n` loads fail
    pub fn failing_loads(self, n: usize) -> Self {
        self.lock().outage = Arc::new(AtomicUsize::new(n));
        self
    }

    /// Every load fails
    pub fn unreachable(self) -> Self {
        self.failing_loads(FOREVER)
    }

    /// Queue a console error, as if the page had logged it
    pub fn console_error(self, message: &str) -> Self {
        self.lock().console_errors.push(message.to_string());
        self
    }

    fn share_outage(&self, outage: Arc<AtomicUsize>) {
        self.lock().outage = outage;
    }

    /// Number of `goto` calls, successful or not
    pub fn loads(&self) -> usize {
        self.lock().loads
    }

    /// Selectors clicked, in order
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    /// `(selector, value)` pairs selected, in order
    pub fn selections(&self) -> Vec<(String, String)> {
        self.lock().selections.clone()
    }

    fn apply(state: &mut MockState, effect: MockEffect) {
        match effect {
            MockEffect::AppendQuery { key, value } => {
                let separator = if state.url.contains('?') { '&' } else { '?' };
                state.url = format!("{}{}{}={}", state.url, separator, key, value);
            }
            MockEffect::SetCount { selector, count } => {
                state.counts.insert(selector, count);
            }
            MockEffect::SetState {
                selector,
                state: element_state,
            } => {
                state.elements.insert(
                    selector,
                    MockElement {
                        state: element_state,
                        hidden_polls: 0,
                    },
                );
            }
        }
    }

    fn attached(state: &MockState, selector: &str) -> bool {
        state
            .elements
            .get(selector)
            .is_some_and(|e| e.hidden_polls == 0 && e.state.attached)
    }
}

/// Decrement the outage counter; true if this load should fail
fn outage_hit(outage: &AtomicUsize) -> bool {
    outage
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| match remaining {
            0 => None,
            FOREVER => Some(FOREVER),
            n => Some(n - 1),
        })
        .is_ok()
}

/// Small solid PNG standing in for a viewport capture
fn placeholder_png() -> DriverResult<Vec<u8>> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(64, 48, Rgb([40, 40, 48]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| DriverError::Protocol(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.loads += 1;
        if outage_hit(&state.outage) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn content(&self) -> DriverResult<String> {
        Ok(self.lock().markup.clone())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        placeholder_png()
    }

    async fn element_state(&self, selector: &str) -> DriverResult<ElementState> {
        let mut state = self.lock();
        match state.elements.get_mut(selector) {
            Some(element) if element.hidden_polls > 0 => {
                element.hidden_polls -= 1;
                Ok(ElementState::DETACHED)
            }
            Some(element) => Ok(element.state),
            None => Ok(ElementState::DETACHED),
        }
    }

    async fn count(&self, selector: &str) -> DriverResult<usize> {
        let state = self.lock();
        if let Some(count) = state.counts.get(selector) {
            return Ok(*count);
        }
        Ok(usize::from(Self::attached(&state, selector)))
    }

    async fn select_option(&self, selector: &str, value: &str) -> DriverResult<()> {
        let mut state = self.lock();
        let Some(options) = state.options.get(selector) else {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        };
        if !options.iter().any(|o| o == value) {
            return Err(DriverError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            });
        }

        state
            .selections
            .push((selector.to_string(), value.to_string()));
        let effects: Vec<MockEffect> = state
            .effects
            .iter()
            .filter(|(s, v, _)| s == selector && v == value)
            .map(|(_, _, effect)| effect.clone())
            .collect();
        for effect in effects {
            Self::apply(&mut state, effect);
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let mut state = self.lock();
        if !Self::attached(&state, selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        state.clicks.push(selector.to_string());

        if let Some(download) = state.downloads.get(selector).cloned() {
            std::fs::create_dir_all(&download.dir)?;
            let path = download.dir.join(&download.filename);
            std::fs::write(&path, b"%PDF-1.4\n%mock report\n")?;
            if let Some(watcher) = state.watcher.take() {
                let _ = watcher.send(Download {
                    url: Some(format!("{}/report.pdf", state.url)),
                    suggested_filename: download.filename.clone(),
                    path: Some(path),
                });
            }
        }
        Ok(())
    }

    async fn watch_download(&self) -> DriverResult<DownloadWatch> {
        let (tx, rx) = oneshot::channel();
        self.lock().watcher = Some(tx);
        Ok(Box::pin(async move { rx.await.map_err(|_| DriverError::Closed) }))
    }

    async fn take_console_errors(&self) -> DriverResult<Vec<String>> {
        Ok(std::mem::take(&mut self.lock().console_errors))
    }
}

type PageFactory = Arc<dyn Fn() -> MockPage + Send + Sync>;

/// Browser handing out pages from a factory.
pub struct MockBrowser {
    factory: PageFactory,
    outage: Option<Arc<AtomicUsize>>,
    pages_opened: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn new_page(&self) -> DriverResult<Box<dyn PageDriver>> {
        let page = (self.factory)();
        if let Some(outage) = &self.outage {
            page.share_outage(Arc::clone(outage));
        }
        self.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(page))
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Launcher for [`MockBrowser`] sessions; records what was launched.
#[derive(Clone)]
pub struct MockLauncher {
    factory: PageFactory,
    outage: Option<Arc<AtomicUsize>>,
    launches: Arc<Mutex<Vec<String>>>,
    pages_opened: Arc<AtomicUsize>,
}

impl MockLauncher {
    pub fn new(factory: impl Fn() -> MockPage + Send + Sync + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            outage: None,
            launches: Arc::new(Mutex::new(Vec::new())),
            pages_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The server refuses the next `n` loads across every page of every session
    pub fn failing_loads(mut self, n: usize) -> Self {
        self.outage = Some(Arc::new(AtomicUsize::new(n)));
        self
    }

    /// The server never answers
    pub fn unreachable(self) -> Self {
        self.failing_loads(FOREVER)
    }

    /// Labels of launched sessions, in order
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, label: &str) -> DriverResult<Box<dyn BrowserDriver>> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(label.to_string());
        }
        Ok(Box::new(MockBrowser {
            factory: Arc::clone(&self.factory),
            outage: self.outage.clone(),
            pages_opened: Arc::clone(&self.pages_opened),
        }))
    }
}
