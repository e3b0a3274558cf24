use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store is at schema version {found}, newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Collection missing after upgrade: {0}")]
    MissingCollection(&'static str),

    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }
}
