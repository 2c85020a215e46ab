use std::path::PathBuf;

/// Core error type for the announcement bot.
///
/// Adapter crates map their framework errors into `External` so command
/// handlers can decide between a plain-language reply and a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("persistence error: {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Network(format!("request timed out: {e}"));
        }
        if let Some(status) = e.status() {
            return Self::Network(format!("unexpected status {status}"));
        }
        Self::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
