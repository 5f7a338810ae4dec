//! Browser-backed tests against a local dashboard fixture.
//!
//! These launch a real Chrome/Chromium through the CDP backend and serve the
//! dashboard from an httpmock server. They are ignored by default; when run
//! without a browser available they print a note and return early.
//!
//! Run with: cargo test --test dashboard_browser -- --ignored --nocapture

use httpmock::prelude::*;
use std::time::Duration;

use report_e2e::config::Config;
use report_e2e::driver::{
    BrowserDriver, BrowserLauncher, ChromeBrowser, ChromeLauncher, ChromeOptions,
};
use report_e2e::harness::{SuiteConfig, SuiteError, run_suite};
use report_e2e::probe::{ProbeConfig, ProbeError};
use report_e2e::scenario::dashboard_scenarios;
use report_e2e::wait::SystemClock;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head><title>Reports</title>
<style>#chart { width: 400px; height: 200px; background: #ccd; }</style>
</head>
<body>
<div id="main-container">
  <select id="date-filter">
    <option value="">All dates</option>
    <option value="2023-01-01">2023-01-01</option>
    <option value="2023-02-01">2023-02-01</option>
  </select>
  <select id="device-filter">
    <option value="all">All devices</option>
    <option value="mobile">Mobile</option>
    <option value="desktop">Desktop</option>
  </select>
  <div id="chart"></div>
  <table id="report">
    <tr class="table-row"><td>Jan</td><td>120</td></tr>
    <tr class="table-row"><td>Feb</td><td>98</td></tr>
  </table>
  <table id="devices"></table>
  <button id="download-pdf">Download PDF</button>
</div>
<script>
  const rows = [["mobile", 40], ["desktop", 80], ["mobile", 12]];
  const devices = document.getElementById("devices");
  function renderDevices(kind) {
    devices.innerHTML = "";
    for (const [device, visits] of rows) {
      if (kind !== "all" && device !== kind) continue;
      const tr = document.createElement("tr");
      tr.className = "device-row " + device;
      tr.innerHTML = "<td>" + device + "</td><td>" + visits + "</td>";
      devices.appendChild(tr);
    }
  }
  renderDevices("all");
  document.getElementById("device-filter").addEventListener("change", (e) => renderDevices(e.target.value));
  document.getElementById("date-filter").addEventListener("change", (e) => {
    const url = new URL(window.location.href);
    url.searchParams.set("date", e.target.value);
    history.pushState({}, "", url);
  });
  document.getElementById("download-pdf").addEventListener("click", () => {
    const a = document.createElement("a");
    a.href = "/report.pdf";
    a.download = "report.pdf";
    document.body.appendChild(a);
    a.click();
    a.remove();
  });
</script>
</body>
</html>"#;

async fn serve_dashboard() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(DASHBOARD_HTML);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/report.pdf");
            then.status(200)
                .header("content-type", "application/pdf")
                .header("content-disposition", "attachment; filename=\"report.pdf\"")
                .body("%PDF-1.4\n%fixture\n");
        })
        .await;
    server
}

/// Records whether storage from an earlier visit is visible, then writes it
const STORAGE_HTML: &str = r#"<!doctype html>
<html><body>
<script>
  if (localStorage.getItem("device-filter")) {
    const seen = document.createElement("div");
    seen.id = "seen";
    seen.textContent = "stored filter found";
    document.body.appendChild(seen);
  }
  localStorage.setItem("device-filter", "mobile");
</script>
</body></html>"#;

/// A launcher whose browser actually starts, or `None` to skip the test
async fn chrome_or_skip(download_dir: &std::path::Path) -> Option<ChromeLauncher> {
    let options = ChromeOptions::from_config(&Config::defaults(), download_dir)
        .navigation_timeout(Duration::from_secs(15));
    let launcher = ChromeLauncher::new(options);

    match launcher.launch("availability-check").await {
        Ok(browser) => {
            let _ = browser.close().await;
            Some(launcher)
        }
        Err(e) => {
            eprintln!("Skipping: Chrome not available ({})", e);
            None
        }
    }
}

fn suite_config(url: &str) -> SuiteConfig {
    SuiteConfig {
        probe: ProbeConfig::new(url, 3, Duration::from_millis(500))
            .setup_timeout(Duration::from_secs(30)),
        test_timeout: Duration::from_secs(60),
        poll_interval: Duration::from_millis(100),
        artifacts: None,
    }
}

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_dashboard_scenarios_in_chrome() {
    let dir = tempfile::tempdir().unwrap();
    let Some(launcher) = chrome_or_skip(&dir.path().join("downloads")).await else {
        return;
    };
    let server = serve_dashboard().await;

    let config = suite_config(&server.base_url()).artifacts_in(dir.path());
    let report = run_suite(&launcher, &SystemClock, &config, &dashboard_scenarios())
        .await
        .expect("suite should reach the fixture server");

    assert!(report.passed(), "{}", report.summary());
    assert!(dir.path().join("debug_before_rendering.png").exists());
}

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_setup_fails_on_closed_port() {
    let dir = tempfile::tempdir().unwrap();
    let Some(launcher) = chrome_or_skip(dir.path()).await else {
        return;
    };

    // Port 9 (discard) is not expected to have an HTTP server
    let config = SuiteConfig {
        probe: ProbeConfig::new("http://127.0.0.1:9/", 2, Duration::from_millis(200)),
        ..suite_config("http://127.0.0.1:9/")
    };

    let err = run_suite(&launcher, &SystemClock, &config, &dashboard_scenarios())
        .await
        .unwrap_err();
    assert!(
        matches!(err, SuiteError::Setup(ProbeError::Exhausted { attempts: 2, .. })),
        "{err}"
    );
}

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_pages_do_not_share_storage() {
    let dir = tempfile::tempdir().unwrap();
    if chrome_or_skip(dir.path()).await.is_none() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/storage");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(STORAGE_HTML);
        })
        .await;
    let url = server.url("/storage");

    let options = ChromeOptions::from_config(&Config::defaults(), dir.path());
    let browser = ChromeBrowser::launch(options, "isolation").await.unwrap();

    let first = browser.new_page().await.unwrap();
    first.goto(&url).await.unwrap();
    assert_eq!(first.count("#seen").await.unwrap(), 0);
    // Same page reloaded sees its own storage
    first.goto(&url).await.unwrap();
    assert_eq!(first.count("#seen").await.unwrap(), 1);

    let second = browser.new_page().await.unwrap();
    second.goto(&url).await.unwrap();
    assert_eq!(second.count("#seen").await.unwrap(), 0);
    assert_eq!(browser.context_count(), 2);

    browser.close().await.unwrap();
}

#[tokio::test]
#[ignore = "needs Chrome"]
async fn test_same_label_browsers_get_private_profiles() {
    let dir = tempfile::tempdir().unwrap();
    if chrome_or_skip(dir.path()).await.is_none() {
        return;
    }
    let options = ChromeOptions::from_config(&Config::defaults(), dir.path());

    let (a, b) = tokio::join!(
        ChromeBrowser::launch(options.clone(), "scenarios"),
        ChromeBrowser::launch(options.clone(), "scenarios"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.profile_dir(), b.profile_dir());

    let profile = a.profile_dir().to_path_buf();
    assert!(profile.exists());
    a.close().await.unwrap();
    b.close().await.unwrap();
    drop(a);
    assert!(!profile.exists());
}
