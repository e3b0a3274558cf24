//! Sound effects requested by the application.
//!
//! Sound files are read from `<assets_dir>/sounds/<name>.mp3` the first time
//! they are requested and kept in memory afterwards. Actual audio output is
//! behind the `SoundOutput` trait; `LogOutput` only records the request.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File extension of bundled sound effects.
const SOUND_EXTENSION: &str = "mp3";

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("Invalid sound name: {0:?}")]
    InvalidName(String),

    #[error("Sound not found: {0}")]
    NotFound(String),

    #[error("Failed to load sound {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait SoundOutput: Send + Sync {
    fn play(&self, name: &str, buffer: Arc<[u8]>) -> impl Future<Output = Result<(), SoundError>> + Send;
}

/// Output that plays nothing and logs what would have been played.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl SoundOutput for LogOutput {
    async fn play(&self, name: &str, buffer: Arc<[u8]>) -> Result<(), SoundError> {
        info!(sound = name, bytes = buffer.len(), "Playing sound");
        Ok(())
    }
}

/// In-memory cache of sound buffers, owned by the interop context.
pub struct SoundBank<O = LogOutput> {
    dir: PathBuf,
    output: O,
    buffers: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl SoundBank<LogOutput> {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self::with_output(assets_dir, LogOutput)
    }
}

impl<O: SoundOutput> SoundBank<O> {
    pub fn with_output(assets_dir: impl Into<PathBuf>, output: O) -> Self {
        Self {
            dir: assets_dir.into().join("sounds"),
            output,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn play(&self, name: &str) -> Result<(), SoundError> {
        let buffer = self.load(name).await?;
        self.output.play(name, buffer).await
    }

    /// Buffer for `name`, reading it from disk on first use.
    pub async fn load(&self, name: &str) -> Result<Arc<[u8]>, SoundError> {
        validate_name(name)?;

        let mut buffers = self.buffers.lock().await;
        if let Some(buffer) = buffers.get(name) {
            return Ok(Arc::clone(buffer));
        }

        let path = self.dir.join(format!("{}.{}", name, SOUND_EXTENSION));
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SoundError::NotFound(name.to_string()),
            _ => SoundError::Load {
                name: name.to_string(),
                source: e,
            },
        })?;

        debug!(sound = name, bytes = bytes.len(), "Loaded sound into memory");
        let buffer: Arc<[u8]> = bytes.into();
        buffers.insert(name.to_string(), Arc::clone(&buffer));
        Ok(buffer)
    }

    pub async fn cached(&self) -> usize {
        self.buffers.lock().await.len()
    }

    /// Release every cached buffer.
    pub async fn clear(&self) {
        self.buffers.lock().await.clear();
    }
}

fn validate_name(name: &str) -> Result<(), SoundError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SoundError::InvalidName(name.to_string()))
    }
}
