//! Test doubles shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::http::{Transport, TransportError};

/// Records every requested URL and answers with a fixed result after an
/// optional delay.
pub struct StubTransport {
    result: Result<u16, TransportError>,
    latency: Duration,
    urls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new(result: Result<u16, TransportError>) -> Arc<Self> {
        Self::with_latency(result, Duration::ZERO)
    }

    pub fn with_latency(result: Result<u16, TransportError>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            result,
            latency,
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &str) -> Result<u16, TransportError> {
        self.urls.lock().push(url.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.result.clone()
    }
}
