//! Run sessions: one directory per suite run.
//!
//! A session directory holds:
//! - `.session.json` with run metadata
//! - debug screenshots and markup dumps, one pair per scenario
//! - `downloads/` with files the pages downloaded
//!
//! Sessions are kept by default since their contents exist for debugging;
//! `keep(false)` removes the directory on drop.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::artifacts::utils::sanitize_name;

/// A run session with organized file management
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after the session ends
    pub keep: bool,
    /// URL the run targets
    pub base_url: Option<String>,
}

impl Session {
    /// Create a session under `base` named after `name` and the current time
    pub fn with_name(base: impl AsRef<Path>, name: &str) -> Self {
        let timestamp = generate_timestamp_suffix();
        let id = format!("{}_{}", sanitize_name(name), timestamp);
        let dir = base.as_ref().join(&id);

        Self {
            id,
            dir,
            keep: true,
            base_url: None,
        }
    }

    /// Create a session in a specific directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("run_{}", generate_timestamp_suffix()));

        Self {
            id,
            dir,
            keep: true,
            base_url: None,
        }
    }

    /// Set whether to keep files after the session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Record the URL under test in the session metadata
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Initialize the session directory
    pub fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::create_dir_all(self.downloads_dir())?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "base_url": self.base_url,
            "pid": std::process::id(),
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// Where pages download files to
    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.join("downloads")
    }

    /// Path of the JSON report for this run
    pub fn report_path(&self) -> PathBuf {
        self.dir.join("report.json")
    }

    /// List debug captures (PNG and HTML) in the session
    pub fn list_captures(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut captures = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                let is_capture = path
                    .extension()
                    .map(|e| e == "png" || e == "html")
                    .unwrap_or(false);
                if is_capture {
                    captures.push(path);
                }
            }
        }
        captures.sort();
        Ok(captures)
    }

    /// Remove the session directory unless it is kept
    pub fn cleanup(&self) -> std::io::Result<()> {
        if self.dir.exists() && !self.keep {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// Generate a timestamp suffix
fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Remove session directories under `base` older than `max_age`
pub fn cleanup_old_sessions(base: &Path, max_age: std::time::Duration) -> std::io::Result<usize> {
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > max_age) && fs::remove_dir_all(&path).is_ok() {
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

/// List all existing sessions under `base`
pub fn list_sessions(base: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_with_name() {
        let session = Session::with_name("/tmp/report-e2e", "dashboard run");
        assert!(session.id.starts_with("dashboard_run_"));
        assert!(session.dir.starts_with("/tmp/report-e2e"));
        assert!(session.keep);
    }

    #[test]
    fn test_init_writes_metadata_and_downloads_dir() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::with_name(base.path(), "run").with_base_url("http://localhost:3000");
        session.init().unwrap();

        assert!(session.downloads_dir().is_dir());
        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(session.dir.join(".session.json")).unwrap())
                .unwrap();
        assert_eq!(meta["base_url"], "http://localhost:3000");
    }

    #[test]
    fn test_list_captures_only_png_and_html() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_dir(base.path().join("run_b"));
        session.init().unwrap();
        fs::write(session.dir.join("debug_before_rendering.png"), b"png").unwrap();
        fs::write(session.dir.join("debug_before_rendering.html"), b"<html>").unwrap();
        fs::write(session.dir.join("debug_before_rendering.png.json"), b"{}").unwrap();

        let captures = session.list_captures().unwrap();
        assert_eq!(
            captures,
            vec![
                session.dir.join("debug_before_rendering.html"),
                session.dir.join("debug_before_rendering.png"),
            ]
        );
    }

    #[test]
    fn test_cleanup_respects_keep() {
        let base = tempfile::tempdir().unwrap();
        let kept = Session::in_dir(base.path().join("kept"));
        kept.init().unwrap();
        kept.cleanup().unwrap();
        assert!(kept.dir.exists());

        let scratch = Session::in_dir(base.path().join("scratch")).keep(false);
        scratch.init().unwrap();
        scratch.cleanup().unwrap();
        assert!(!scratch.dir.exists());
    }

    #[test]
    fn test_unkept_session_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let dir = {
            let session = Session::with_name(base.path(), "scratch").keep(false);
            session.init().unwrap();
            session.dir.clone()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_list_and_cleanup_sessions() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_dir(base.path().join("run_a"));
        session.init().unwrap();

        assert_eq!(list_sessions(base.path()).unwrap(), vec![session.dir.clone()]);
        assert_eq!(cleanup_old_sessions(base.path(), Duration::from_secs(3600)).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cleanup_old_sessions(base.path(), Duration::ZERO).unwrap(), 1);
        assert!(list_sessions(base.path()).unwrap().is_empty());
    }
}
