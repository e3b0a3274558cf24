//! Offline cache gateway for the app shell.
//!
//! This module provides:
//! - `OfflineGateway`: cache-first request handling with a network fallback
//!   and an offline-degraded root fallback
//! - `CacheStorage` / `CacheGeneration`: versioned response caches on disk
//! - `Fetcher` / `HttpFetcher`: the network seam
//!
//! Each version string gets its own cache generation; activating a new
//! version deletes the generations it supersedes.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod worker;

pub use cache::{cache_name, validate_version, CacheGeneration, CacheStorage, CachedResponse};
pub use error::GatewayError;
pub use fetch::{FetchedResponse, Fetcher, HttpFetcher};
pub use worker::{
    asset_manifest, GatewayResponse, Intercept, OfflineGateway, ResponseSource, WorkerState,
};
