// Core types for diagnostic artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::driver::DriverError;

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// PNG capture of the page
    Screenshot,
    /// Serialized page markup
    Markup,
    /// File the page downloaded
    Download,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::Markup => "html",
            ArtifactKind::Download => "bin",
        }
    }
}

/// Configuration for artifact capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory where artifacts will be saved
    pub output_dir: PathBuf,

    /// Whether to write a JSON manifest next to each artifact
    pub include_manifest: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(crate::config::DEFAULT_ARTIFACT_DIR),
            include_manifest: true,
        }
    }
}

/// A file written for debugging a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Path to the file
    pub path: PathBuf,

    pub kind: ArtifactKind,

    /// Scenario that produced it
    pub scenario: String,

    /// Optional metadata (dimensions, byte size, URL)
    pub metadata: Option<serde_json::Value>,

    /// Timestamp when the artifact was written
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        path: PathBuf,
        kind: ArtifactKind,
        scenario: &str,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path,
            kind,
            scenario: scenario.to_string(),
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// Result type for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Error types for artifact operations
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The page could not produce the data
    #[error("capture error: {0}")]
    Capture(#[from] DriverError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
