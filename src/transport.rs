//! HTTP transport used to reach the routing services.
//!
//! The snapping code only ever issues plain GET requests and needs the
//! status code plus the raw body, so the seam is a single method. The
//! reqwest implementation lives behind the `http` feature; tests substitute
//! a recording mock.

use futures::future::BoxFuture;

use crate::error::TransportError;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        (**self).get(url)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        (**self).get(url)
    }
}

#[cfg(feature = "http")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::*;
    use crate::SnapConfig;
    use log::debug;
    use reqwest::Client;
    use std::time::{Duration, Instant};

    const MAX_IDLE_PER_HOST: usize = 8;

    /// Pooled reqwest client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new(config: &SnapConfig) -> Result<Self, TransportError> {
            let client = Client::builder()
                .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
                .pool_idle_timeout(Duration::from_secs(60))
                .tcp_keepalive(Duration::from_secs(30))
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

            Ok(Self { client })
        }
    }

    impl Transport for ReqwestTransport {
        fn get<'a>(
            &'a self,
            url: &'a str,
        ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
            Box::pin(async move {
                let req_start = Instant::now();

                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                let status = resp.status().as_u16();

                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| TransportError::Body(e.to_string()))?;

                debug!(
                    "[Transport] HTTP {} in {:?} ({:.1}KB)",
                    status,
                    req_start.elapsed(),
                    bytes.len() as f64 / 1024.0
                );

                Ok(TransportResponse { status, body: bytes.to_vec() })
            })
        }
    }
}
