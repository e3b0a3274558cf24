//! Bridge between the application and local resources.
//!
//! The application talks to this layer through two channels:
//! - inbound: tagged events (`StoreWorkout`, `StoreBurpeeVariant`,
//!   `LogError`, `PlaySound`), executed fire-and-forget
//! - outbound: a single `InitData` message at session start
//!
//! Failures are logged here and never reported back to the application.

pub mod error;
pub mod message;
pub mod shell;

pub use error::InteropError;
pub use message::{ElmMessage, InitData, ShellEvent};
pub use shell::Interop;
