use thiserror::Error;

use crate::sound::SoundError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum InteropError {
    #[error("Event is missing a tag")]
    MissingTag,

    #[error("Malformed event: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid data for {tag}: {source}")]
    InvalidPayload {
        tag: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sound error: {0}")]
    Sound(#[from] SoundError),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
