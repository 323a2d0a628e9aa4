use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A bundle entry does not hash to the name it claims. The whole bundle is rejected.
    #[error("Integrity check failed for bundle entry {entry}: expected {expected}, got {actual}")]
    Integrity {
        entry: String,
        expected: String,
        actual: String,
    },

    #[error("Not a SHA-1 content name: {0:?}")]
    InvalidHash(String),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    // ── Versions ────────────────────────────────────────
    #[error("Cannot resolve version: {0}")]
    Resolution(String),

    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("A launch is already in progress ({0})")]
    AlreadyLaunching(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("Task join error: {0}")]
    Join(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for LauncherError {
    fn from(e: tokio::task::JoinError) -> Self {
        LauncherError::Join(e.to_string())
    }
}

impl LauncherError {
    /// Attach a path to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

// Errors cross the worker boundary and the UI boundary as plain strings.
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
