//! End-to-end scenarios against the report dashboard.
//!
//! A [`Scenario`] is data: a readiness wait, a control wait, one
//! interaction and one expectation. [`run_scenario`] drives any of them
//! through the same sequence on a [`PageDriver`](crate::driver::PageDriver).

pub mod dashboard;
pub mod exec;
pub mod types;

pub use dashboard::{dashboard_scenarios, select_scenarios};
pub use exec::{ScenarioContext, execute, run_scenario};
pub use types::{
    Expectation, Interaction, Readiness, ReadinessWait, Scenario, ScenarioError, ScenarioResult,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactConfig, ArtifactKind};
    use crate::driver::{ElementState, MockPage, PageDriver};
    use crate::wait::{ManualClock, SystemClock};
    use std::time::Duration;

    const URL: &str = "http://localhost:3000";

    fn ctx<'a>(
        clock: &'a dyn crate::wait::Clock,
        artifacts: Option<&'a ArtifactConfig>,
    ) -> ScenarioContext<'a> {
        ScenarioContext {
            base_url: URL,
            clock,
            poll_interval: Duration::from_millis(100),
            test_timeout: Duration::from_secs(90),
            artifacts,
        }
    }

    #[tokio::test]
    async fn test_all_scenarios_pass_on_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();

        for scenario in dashboard_scenarios() {
            let page = MockPage::dashboard(dir.path().join("downloads"));
            let outcome = run_scenario(&page, &scenario, ctx(&clock, None)).await;
            assert!(outcome.passed, "{}: {:?}", scenario.name, outcome.error);
            assert_eq!(page.loads(), 1);
        }
    }

    #[tokio::test]
    async fn test_date_filter_selects_value() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir());

        execute(&page, &dashboard::date_filter(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(
            page.selections(),
            vec![("select#date-filter".to_string(), "2023-01-01".to_string())]
        );
    }

    #[tokio::test]
    async fn test_readiness_waits_for_late_element() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir()).appears_after(
            "#chart",
            ElementState::VISIBLE,
            3,
        );

        execute(&page, &dashboard::rendering(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_control_times_out() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir())
            .element("#chart", ElementState::DETACHED);

        let err = execute(&page, &dashboard::rendering(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("#chart to be visible"), "{err}");
        assert!(clock.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_hidden_control_fails_visibility() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir())
            .element("select#date-filter", ElementState::HIDDEN);

        let err = execute(&page, &dashboard::date_filter(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScenarioError::AssertionFailed(_)), "{err}");
        assert!(page.selections().is_empty());
    }

    #[tokio::test]
    async fn test_hidden_body_blocks_date_filter() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir()).element("body", ElementState::HIDDEN);

        let err = execute(&page, &dashboard::date_filter(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("body to be visible"), "{err}");
        assert!(page.selections().is_empty());
    }

    #[tokio::test]
    async fn test_console_errors_drained_without_failing() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir())
            .console_error("Failed to load resource: 404")
            .console_error("Uncaught TypeError: rows is undefined");

        let outcome = run_scenario(&page, &dashboard::rendering(), ctx(&clock, None)).await;

        assert!(outcome.passed, "{:?}", outcome.error);
        assert!(page.take_console_errors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_mobile_rows_fails_assertion() {
        let clock = ManualClock::new();
        let page = MockPage::dashboard(std::env::temp_dir()).on_select(
            "select#device-filter",
            "mobile",
            crate::driver::MockEffect::SetCount {
                selector: ".device-row.mobile".to_string(),
                count: 0,
            },
        );

        let err = execute(&page, &dashboard::device_filter(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScenarioError::AssertionFailed(_)), "{err}");
    }

    #[tokio::test]
    async fn test_url_never_updates() {
        let clock = ManualClock::new();
        let page = MockPage::new()
            .element("body", ElementState::VISIBLE)
            .select("select#date-filter", &["2023-01-01"]);

        let err = execute(&page, &dashboard::date_filter(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("date=2023-01-01"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_without_event_times_out() {
        let clock = ManualClock::new();
        let page = MockPage::new()
            .element("#main-container", ElementState::VISIBLE)
            .element("button#download-pdf", ElementState::VISIBLE);

        let err = execute(&page, &dashboard::pdf_download(), ctx(&clock, None), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("download event"), "{err}");
        assert_eq!(page.clicks(), vec!["button#download-pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_debug_capture_and_download_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactConfig {
            output_dir: dir.path().to_path_buf(),
            include_manifest: true,
        };
        let clock = ManualClock::new();
        let page = MockPage::dashboard(dir.path().join("downloads"));

        let outcome = run_scenario(&page, &dashboard::pdf_download(), ctx(&clock, Some(&config))).await;
        assert!(outcome.passed, "{:?}", outcome.error);

        let kinds: Vec<ArtifactKind> = outcome.artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ArtifactKind::Screenshot, ArtifactKind::Markup, ArtifactKind::Download]
        );
        assert!(dir.path().join("debug_before_pdf_download.png").exists());
        assert!(dir.path().join("downloads/report.pdf").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_budget_enforced() {
        let page = MockPage::new();
        let mut scenario = dashboard::rendering();
        scenario.readiness.timeout = Duration::from_secs(600);

        let mut context = ctx(&SystemClock, None);
        context.test_timeout = Duration::from_secs(90);
        let outcome = run_scenario(&page, &scenario, context).await;

        assert!(!outcome.passed);
        assert!(outcome.timed_out);
        assert!(outcome.error.unwrap().contains("budget"));
    }
}
