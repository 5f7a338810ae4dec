use chrono::Utc;
use std::fs;
use std::io::Cursor;

use crate::artifacts::types::{Artifact, ArtifactConfig, ArtifactKind, ArtifactResult};

/// Generate a timestamp string in YYYYMMDD_HHMMSS format
pub fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Filename for a pre-interaction debug capture, e.g. `debug_before_date_filter.png`
pub fn debug_filename(scenario: &str, kind: ArtifactKind) -> String {
    format!(
        "debug_before_{}.{}",
        sanitize_name(scenario),
        kind.extension()
    )
}

/// Sanitize a name for use in filenames
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Create base metadata map for artifacts
pub fn create_base_metadata(
    kind: ArtifactKind,
    scenario: &str,
    timestamp: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let mut meta = serde_json::Map::new();
    meta.insert(
        "kind".to_string(),
        serde_json::to_value(kind).unwrap_or(serde_json::Value::Null),
    );
    meta.insert(
        "scenario".to_string(),
        serde_json::Value::String(scenario.to_string()),
    );
    meta.insert(
        "timestamp".to_string(),
        serde_json::Value::String(timestamp.to_string()),
    );
    meta
}

/// Read width and height from PNG bytes without decoding the pixels
pub fn png_dimensions(data: &[u8]) -> ArtifactResult<(u32, u32)> {
    let reader = image::io::Reader::with_format(Cursor::new(data), image::ImageFormat::Png);
    Ok(reader.into_dimensions()?)
}

/// Write the JSON manifest for an artifact if configured
pub fn write_manifest(artifact: &Artifact, config: &ArtifactConfig) -> ArtifactResult<()> {
    if config.include_manifest {
        let manifest_path = manifest_path(artifact);
        fs::write(manifest_path, serde_json::to_string_pretty(artifact)?)?;
    }
    Ok(())
}

/// `report.pdf` -> `report.pdf.json`
pub fn manifest_path(artifact: &Artifact) -> std::path::PathBuf {
    let mut name = artifact
        .path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".json");
    artifact.path.with_file_name(name)
}
