//! Mission Source
//!
//! Where raw mission text comes from: a local waypoint file or an HTTP(S)
//! URL. Selection happens once per run and exactly one fetch executes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fallback mission URL when neither `--url` nor `--file` is given.
pub const DEFAULT_MISSION_URL: &str = "http://winggate.co.jp/mission_9th.waypoints";

/// Remote fetch deadline.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("mission file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read mission file {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    #[error("mission fetch failed with HTTP status {status}")]
    Http { status: u16 },

    #[error("mission host unreachable: {0}")]
    Unreachable(String),
}

/// Resolved origin of the mission text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionSource {
    Remote(String),
    Local(PathBuf),
}

impl MissionSource {
    /// Selection policy: a URL wins over a file path; with neither, the
    /// built-in default URL is used.
    pub fn select(url: Option<String>, file: Option<PathBuf>) -> Self {
        match (url, file) {
            (Some(url), _) => MissionSource::Remote(url),
            (None, Some(path)) => MissionSource::Local(path),
            (None, None) => MissionSource::Remote(DEFAULT_MISSION_URL.to_string()),
        }
    }

    /// Fetch the raw mission text from this source.
    pub fn fetch(&self) -> Result<String, SourceError> {
        match self {
            MissionSource::Remote(url) => fetch_remote(url),
            MissionSource::Local(path) => fetch_local(path),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MissionSource::Remote(url) => format!("url {url}"),
            MissionSource::Local(path) => format!("file {}", path.display()),
        }
    }
}

/// Read mission text from a local file.
pub fn fetch_local(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound {
            path: path.to_path_buf(),
        },
        _ => SourceError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Fetch mission text over HTTP(S) with a bounded timeout.
pub fn fetch_remote(url: &str) -> Result<String, SourceError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| SourceError::Unreachable(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| SourceError::Unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http {
            status: status.as_u16(),
        });
    }

    response
        .text()
        .map_err(|e| SourceError::Unreachable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_select_url_wins_over_file() {
        let source = MissionSource::select(
            Some("http://example.invalid/m.waypoints".into()),
            Some(PathBuf::from("mission.txt")),
        );
        assert_eq!(
            source,
            MissionSource::Remote("http://example.invalid/m.waypoints".into())
        );
    }

    #[test]
    fn test_select_file_without_url() {
        let source = MissionSource::select(None, Some(PathBuf::from("mission.txt")));
        assert_eq!(source, MissionSource::Local(PathBuf::from("mission.txt")));
    }

    #[test]
    fn test_select_defaults_to_builtin_url() {
        let source = MissionSource::select(None, None);
        assert_eq!(
            source,
            MissionSource::Remote(DEFAULT_MISSION_URL.to_string())
        );
    }

    #[test]
    fn test_fetch_local_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "QGC WPL 110\n").unwrap();
        let text = fetch_local(file.path()).unwrap();
        assert_eq!(text, "QGC WPL 110\n");
    }

    #[test]
    fn test_fetch_local_missing_file() {
        let err = fetch_local(Path::new("/nonexistent/mission.waypoints")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }
}
