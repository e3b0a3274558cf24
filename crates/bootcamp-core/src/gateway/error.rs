use std::path::PathBuf;

use thiserror::Error;

use super::WorkerState;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network failure fetching {url}: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("No cached response for {0}")]
    CacheMiss(String),

    #[error("Install failed on {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cache storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Not a usable cache name or version: {0:?}")]
    InvalidName(String),

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cannot {action} while worker is {state:?}")]
    InvalidState {
        action: &'static str,
        state: WorkerState,
    },
}

impl GatewayError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GatewayError::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn network(url: impl ToString, reason: impl ToString) -> Self {
        GatewayError::NetworkFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Reinterpret a failure during bulk population as an install failure.
    pub(crate) fn into_install_failure(self, url: &str) -> Self {
        match self {
            GatewayError::InstallFailed { .. } => self,
            other => GatewayError::InstallFailed {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
