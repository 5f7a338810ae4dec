//! Diagnostic artifacts: screenshots, markup dumps, downloads.
//!
//! These are side-channel debugging aids. Nothing here decides whether a
//! scenario passes; callers log capture failures and move on.

pub mod types;
pub mod utils;

pub use types::{Artifact, ArtifactConfig, ArtifactError, ArtifactKind, ArtifactResult};
pub use utils::{create_base_metadata, debug_filename, generate_timestamp, write_manifest};

use std::fs;
use tracing::debug;

use crate::driver::{Download, PageDriver};

/// Capture a screenshot and the page markup before a scenario interacts with the page.
pub async fn capture_debug(
    page: &dyn PageDriver,
    scenario: &str,
    config: &ArtifactConfig,
) -> ArtifactResult<Vec<Artifact>> {
    fs::create_dir_all(&config.output_dir)?;
    let timestamp = generate_timestamp();
    let url = page.current_url().await.ok();

    let png = page.screenshot().await?;
    let screenshot_path = config
        .output_dir
        .join(debug_filename(scenario, ArtifactKind::Screenshot));
    fs::write(&screenshot_path, &png)?;

    let mut meta = create_base_metadata(ArtifactKind::Screenshot, scenario, &timestamp);
    let (width, height) = utils::png_dimensions(&png)?;
    meta.insert("width".to_string(), width.into());
    meta.insert("height".to_string(), height.into());
    if let Some(url) = &url {
        meta.insert("url".to_string(), url.clone().into());
    }
    let screenshot = Artifact::new(
        screenshot_path,
        ArtifactKind::Screenshot,
        scenario,
        Some(serde_json::Value::Object(meta)),
    );
    write_manifest(&screenshot, config)?;

    let html = page.content().await?;
    let markup_path = config
        .output_dir
        .join(debug_filename(scenario, ArtifactKind::Markup));
    fs::write(&markup_path, &html)?;

    let mut meta = create_base_metadata(ArtifactKind::Markup, scenario, &timestamp);
    meta.insert("bytes".to_string(), html.len().into());
    if let Some(url) = url {
        meta.insert("url".to_string(), url.into());
    }
    let markup = Artifact::new(
        markup_path,
        ArtifactKind::Markup,
        scenario,
        Some(serde_json::Value::Object(meta)),
    );
    write_manifest(&markup, config)?;

    debug!(scenario, dir = %config.output_dir.display(), "Wrote debug capture");
    Ok(vec![screenshot, markup])
}

/// Record a completed download as an artifact. Returns `None` if it has no local path.
pub fn record_download(
    download: &Download,
    scenario: &str,
    config: &ArtifactConfig,
) -> ArtifactResult<Option<Artifact>> {
    let Some(path) = &download.path else {
        return Ok(None);
    };

    let mut meta = create_base_metadata(ArtifactKind::Download, scenario, &generate_timestamp());
    meta.insert(
        "suggested_filename".to_string(),
        download.suggested_filename.clone().into(),
    );
    if let Some(url) = &download.url {
        meta.insert("url".to_string(), url.clone().into());
    }
    if let Ok(file) = fs::metadata(path) {
        meta.insert("bytes".to_string(), file.len().into());
    }

    let artifact = Artifact::new(
        path.clone(),
        ArtifactKind::Download,
        scenario,
        Some(serde_json::Value::Object(meta)),
    );
    write_manifest(&artifact, config)?;
    Ok(Some(artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockPage;

    #[tokio::test]
    async fn test_capture_debug_writes_files_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactConfig {
            output_dir: dir.path().to_path_buf(),
            include_manifest: true,
        };
        let page = MockPage::new().markup("<html><body>hi</body></html>");

        let artifacts = capture_debug(&page, "rendering", &config).await.unwrap();
        assert_eq!(artifacts.len(), 2);

        let screenshot = &artifacts[0];
        assert_eq!(screenshot.kind, ArtifactKind::Screenshot);
        assert!(screenshot.path.ends_with("debug_before_rendering.png"));
        let meta = screenshot.metadata.as_ref().unwrap();
        assert_eq!(meta["width"], 64);
        assert_eq!(meta["height"], 48);

        let markup = &artifacts[1];
        assert_eq!(
            fs::read_to_string(&markup.path).unwrap(),
            "<html><body>hi</body></html>"
        );
        assert!(dir.path().join("debug_before_rendering.html.json").exists());
        assert!(dir.path().join("debug_before_rendering.png.json").exists());
    }

    #[test]
    fn test_record_download_without_path() {
        let download = Download {
            url: None,
            suggested_filename: "report.pdf".to_string(),
            path: None,
        };
        let config = ArtifactConfig::default();
        assert!(record_download(&download, "pdf_download", &config)
            .unwrap()
            .is_none());
    }
}
