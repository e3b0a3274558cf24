//! Network access for the gateway.
//!
//! The gateway only depends on the `Fetcher` trait so that the network can be
//! swapped out; `HttpFetcher` is the reqwest-backed implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Url};
use tracing::debug;

use super::GatewayError;

/// HTTP request timeout in seconds.
/// Bounds how long a hung request can hold a response open.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A response as it came off the network.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Same meaning as `Response.ok`: any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Fetcher: Send + Sync + 'static {
    /// Fetch `url`. A transport failure is `GatewayError::NetworkFailure`;
    /// any HTTP status, including errors, is a successful fetch.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedResponse, GatewayError>> + Send;
}

/// Fetcher backed by a shared reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::network("<client>", e))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResponse, GatewayError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| GatewayError::network(url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::network(url, e))?;

        debug!(url = %url, status, bytes = body.len(), "Fetched from network");
        Ok(FetchedResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
