//! BurpeeBootcamp core library.
//!
//! Local-first support for the BurpeeBootcamp app shell:
//! - `store`: workout history and the selected burpee variant on disk
//! - `gateway`: versioned offline cache with cache-first request handling
//! - `interop`: tagged messages between the application and this layer
//! - `sound`: sound effect buffers for `PlaySound` events
//! - `config`: file and environment configuration

pub mod config;
pub mod gateway;
pub mod interop;
pub mod models;
pub mod sound;
pub mod store;
mod utils;

pub use config::Config;
pub use gateway::{GatewayError, HttpFetcher, Intercept, OfflineGateway};
pub use interop::{ElmMessage, Interop, InteropError, ShellEvent};
pub use models::{BurpeeVariant, WorkoutRecord};
pub use sound::{SoundBank, SoundError};
pub use store::{LocalStore, StoreError};
