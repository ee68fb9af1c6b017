//! The transport capability the pipeline is built on.
//!
//! A [`Transport`] performs exactly one network exchange. Everything else
//! (retries, deadlines, parsing) happens above it, in the client. The default
//! implementation, [`ReqwestTransport`], is backed by `reqwest`; tests and
//! embedders can supply their own.

use crate::{Error, RawResponse, Request, Result, TransportError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Performs one HTTP exchange.
///
/// Implementations must stop work promptly once `cancel` is cancelled. The
/// pipeline cancels the token when an attempt times out, when the total
/// timeout elapses, and when the caller aborts the call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and reads the full response.
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// A [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let url = response.url().clone();
            let body = response.bytes().await?;
            Ok::<_, TransportError>(RawResponse::new(status, url, headers, body))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = exchange => result,
        }
    }
}
