//! Durable local persistence for workout history and the variant preference.
//!
//! The store is a versioned directory (`<data_dir>/BurpeeBootcamp`) with a
//! `meta.json` schema marker and one directory per collection:
//! - `workouts`: one `<timestamp>.json` file per record, read back in timestamp order
//! - `burpee`: one `<id>.json` file per record, holding the single `current` preference
//!
//! Opening the store creates it on first use and upgrades older schema
//! versions in place.

pub mod error;
pub mod local;

pub use error::StoreError;
pub use local::{LocalStore, DATABASE_NAME, SCHEMA_VERSION};
