//! Observation hooks around the request pipeline.
//!
//! Interceptors can log, record metrics or trace calls, but they cannot change
//! what a call returns. A hook that fails is logged at `warn` level and the
//! pipeline continues as if it had succeeded.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use safe_fetch::{BoxError, Interceptor, NormalizedError, RawResponse, Request};
//!
//! struct LogCalls;
//!
//! #[async_trait]
//! impl Interceptor for LogCalls {
//!     async fn on_request(&self, request: &Request) -> Result<(), BoxError> {
//!         println!("-> {} {}", request.method, request.url);
//!         Ok(())
//!     }
//!
//!     async fn on_error(&self, error: &NormalizedError) -> Result<(), BoxError> {
//!         println!("!! {}: {}", error.kind(), error);
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::BoxError;
use crate::{NormalizedError, RawResponse, Request};
use async_trait::async_trait;
use std::sync::Arc;

/// Side-effect-only hooks invoked by the pipeline.
///
/// All methods default to doing nothing.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called once per call, before the first attempt, with the resolved
    /// request.
    async fn on_request(&self, _request: &Request) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called for every raw response obtained, including ones that are
    /// retried or later reported as an HTTP error.
    async fn on_response(&self, _response: &RawResponse) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called once when a call's error is finalized.
    async fn on_error(&self, _error: &NormalizedError) -> Result<(), BoxError> {
        Ok(())
    }
}

/// The interceptors registered on a client, fired in registration order.
#[derive(Clone, Default)]
pub(crate) struct Interceptors {
    hooks: Vec<Arc<dyn Interceptor>>,
}

impl Interceptors {
    pub(crate) fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.hooks.push(interceptor);
    }

    pub(crate) async fn request(&self, request: &Request) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_request(request).await {
                tracing::warn!(error = %e, hook = "on_request", "Interceptor failed");
            }
        }
    }

    pub(crate) async fn response(&self, response: &RawResponse) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_response(response).await {
                tracing::warn!(error = %e, hook = "on_response", "Interceptor failed");
            }
        }
    }

    pub(crate) async fn error(&self, error: &NormalizedError) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_error(error).await {
                tracing::warn!(error = %e, hook = "on_error", "Interceptor failed");
            }
        }
    }
}
