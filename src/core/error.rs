use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the loader.
/// Every module returns `Result<T, LoaderError>`.
#[derive(Debug, Error)]
pub enum LoaderError {
    // ── Lookup ──────────────────────────────────────────
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Re-entrant lookup refused: {0}")]
    Reentrant(String),

    // ── Security ────────────────────────────────────────
    #[error("Sealing violation: {0}")]
    SecurityViolation(String),

    // ── Input ───────────────────────────────────────────
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    /// `true` for every variant a caller should read as "not available here".
    ///
    /// A refused re-entrant lookup is reported separately for diagnostics but
    /// behaves exactly like a miss.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LoaderError::NotFound(_) | LoaderError::ClassNotFound(_) | LoaderError::Reentrant(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(source: std::io::Error) -> Self {
        LoaderError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
