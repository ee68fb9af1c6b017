//! # safe-fetch - HTTP calls that never throw
//!
//! safe-fetch is an HTTP request pipeline built on top of `reqwest`. Every
//! call resolves to a [`SafeResult`]: either the validated response data, or
//! one [`NormalizedError`] out of a closed set of four kinds. It handles
//! per-attempt and total deadlines, retries with exponential backoff and
//! `Retry-After`, response parsing and validation, and observation hooks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use safe_fetch::{Backoff, Client, RequestOptions, SafeResult};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), safe_fetch::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(5))
//!         .total_timeout(Duration::from_secs(30))
//!         .retry_strategy(Backoff::new(3).max_delay(Duration::from_secs(10)))
//!         .build()?;
//!
//!     // Make a GET request
//!     match client.get::<User>("/users/123", RequestOptions::new()).await {
//!         SafeResult::Success(user) => {
//!             println!("User: {}", user.data.name);
//!             println!("Request took {:?}", user.latency);
//!         }
//!         SafeResult::Failure(failure) => eprintln!("{}", failure.error),
//!     }
//!
//!     // Make a POST request
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created = client
//!         .post::<User, _>("/users", &new_user, RequestOptions::new())
//!         .await;
//!     if let Some(user) = created.data() {
//!         println!("Created user with ID: {}", user.id);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **No exceptions** - Every outcome is a value; failures are one of `Network`, `Timeout`, `Http` or `Validation`
//! - **Deadlines** - A per-attempt timeout and a total timeout that also bounds backoff waits
//! - **Retries** - Exponential backoff with an optional cap, `Retry-After` support and custom predicates
//! - **Parsing and validation** - JSON, text, bytes or no body, then an optional validator
//! - **Interceptors** - Observe requests, responses and errors without affecting results
//! - **Automatic logging** - Structured logging with `tracing` for observability
//! - **Query adapters** - Plug calls into query/mutation style data-fetching layers
//!
//! ## Error Handling
//!
//! Failures keep the raw response whenever one was obtained:
//!
//! ```no_run
//! use safe_fetch::{Client, NormalizedError, RequestOptions, SafeResult};
//!
//! # async fn example() -> Result<(), safe_fetch::Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get::<serde_json::Value>("/endpoint", RequestOptions::new()).await {
//!     SafeResult::Success(response) => {
//!         println!("Success: {:?}", response.data);
//!     }
//!     SafeResult::Failure(failure) => match &failure.error {
//!         NormalizedError::Http { status, body, .. } => {
//!             eprintln!("HTTP error {}: {:?}", status, body);
//!         }
//!         NormalizedError::Timeout { timeout, .. } => {
//!             eprintln!("Gave up after {:?}", timeout);
//!         }
//!         other => eprintln!("{}: {}", other.kind(), other),
//!     },
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry Strategies
//!
//! By default only GET and HEAD requests are retried, and only on network
//! errors, timeouts, 5xx and 429. A custom predicate replaces that rule:
//!
//! ```no_run
//! use safe_fetch::{Backoff, Client, retry::{OrPredicate, RetryOn5xx, RetryOnTimeout}};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), safe_fetch::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .retry_strategy(
//!         Backoff::new(5)
//!             .base_delay(Duration::from_millis(100))
//!             .max_delay(Duration::from_secs(30))
//!             .jitter(true)
//!             .retry_on(OrPredicate::new(vec![
//!                 Box::new(RetryOn5xx),
//!                 Box::new(RetryOnTimeout),
//!             ])),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod interceptor;
mod parse;
pub mod query;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder, ErrorMapper};
pub use error::{BoxError, Cause, Error, ErrorKind, NormalizedError, Result, TransportError};
pub use interceptor::Interceptor;
pub use parse::{Body, ParseAs, ValidateResult, Validator};
pub use request::{Query, Request, RequestBody, RequestOptions};
pub use response::{Failure, RawResponse, Response, SafeResult};
pub use retry::{Backoff, RetryContext, RetryPredicate, RetryStrategy};
pub use transport::{ReqwestTransport, Transport};
