//! The report dashboard checks.

use std::time::Duration;

use super::types::{Expectation, Interaction, ReadinessWait, Scenario};

/// Budget for the page-level readiness signal
pub const PAGE_READY_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for the scenario's control to appear
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(20);
/// Budget for the URL to reflect a filter change
pub const URL_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for the download event after the click
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub const DATE_FILTER: &str = "date_filter";
pub const DEVICE_FILTER: &str = "device_filter";
pub const RENDERING: &str = "rendering";
pub const PDF_DOWNLOAD: &str = "pdf_download";

/// Choosing a date updates the URL query.
pub fn date_filter() -> Scenario {
    Scenario {
        name: DATE_FILTER.to_string(),
        title: "Date filter updates the URL".to_string(),
        readiness: ReadinessWait::visible("body", PAGE_READY_TIMEOUT),
        control: ReadinessWait::attached("select#date-filter", CONTROL_TIMEOUT),
        interaction: Interaction::SelectOption {
            selector: "select#date-filter".to_string(),
            value: "2023-01-01".to_string(),
        },
        expectation: Expectation::UrlContains {
            fragment: "date=2023-01-01".to_string(),
            timeout: URL_TIMEOUT,
        },
    }
}

/// Choosing "mobile" leaves at least one mobile row.
pub fn device_filter() -> Scenario {
    Scenario {
        name: DEVICE_FILTER.to_string(),
        title: "Device filter shows mobile rows".to_string(),
        readiness: ReadinessWait::visible("#main-container", PAGE_READY_TIMEOUT),
        control: ReadinessWait::visible("select#device-filter", CONTROL_TIMEOUT),
        interaction: Interaction::SelectOption {
            selector: "select#device-filter".to_string(),
            value: "mobile".to_string(),
        },
        expectation: Expectation::CountAtLeastOne {
            selector: ".device-row.mobile".to_string(),
        },
    }
}

/// Chart and table both render.
pub fn rendering() -> Scenario {
    Scenario {
        name: RENDERING.to_string(),
        title: "Chart and table render".to_string(),
        readiness: ReadinessWait::visible("#main-container", PAGE_READY_TIMEOUT),
        control: ReadinessWait::visible("#chart", CONTROL_TIMEOUT),
        interaction: Interaction::None,
        expectation: Expectation::CountAtLeastOne {
            selector: ".table-row".to_string(),
        },
    }
}

/// The download button produces a file on disk.
pub fn pdf_download() -> Scenario {
    Scenario {
        name: PDF_DOWNLOAD.to_string(),
        title: "PDF download produces a file".to_string(),
        readiness: ReadinessWait::visible("#main-container", PAGE_READY_TIMEOUT),
        control: ReadinessWait::visible("button#download-pdf", CONTROL_TIMEOUT),
        interaction: Interaction::ClickForDownload {
            selector: "button#download-pdf".to_string(),
            timeout: DOWNLOAD_TIMEOUT,
        },
        expectation: Expectation::DownloadHasPath,
    }
}

/// All four checks, in declaration order
pub fn dashboard_scenarios() -> Vec<Scenario> {
    vec![date_filter(), device_filter(), rendering(), pdf_download()]
}

/// Keep only the scenarios named in `names`; an empty list keeps all.
///
/// Returns the unknown names as the error.
pub fn select_scenarios(
    scenarios: Vec<Scenario>,
    names: &[String],
) -> Result<Vec<Scenario>, Vec<String>> {
    if names.is_empty() {
        return Ok(scenarios);
    }

    let unknown: Vec<String> = names
        .iter()
        .filter(|n| !scenarios.iter().any(|s| &s.name == *n))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }

    Ok(scenarios
        .into_iter()
        .filter(|s| names.contains(&s.name))
        .collect())
}
