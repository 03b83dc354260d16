//! HTTP transport used by virtual users.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::LoadTestError;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a request produced no response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Issues requests on behalf of virtual users. All VUs of a run share one
/// transport, so implementations must pool connections themselves.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET and return the response status code.
    async fn get(&self, url: &str) -> Result<u16, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, LoadTestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("assignments-load-test/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LoadTestError::HttpClient)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<u16, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        // A response only counts once its whole body has arrived
        response.bytes().await.map_err(classify)?;
        Ok(status)
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
