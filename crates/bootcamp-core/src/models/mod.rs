//! Data models shared between the store and the shell messages.
//!
//! - `WorkoutRecord`: one finished workout, keyed by timestamp
//! - `BurpeeVariant`, `VariantPreference`: the selected exercise variant

pub mod variant;
pub mod workout;

pub use variant::{BurpeeVariant, VariantPreference, CURRENT_VARIANT_ID};
pub use workout::WorkoutRecord;
