//! Adapters for cache-based data-fetching layers.
//!
//! Query caches expect a function that either resolves to data or fails.
//! [`unwrap`] converts a [`SafeResult`] into that shape, and [`query_fn`] and
//! [`mutation_fn`] bind a URL and options into reusable callables.
//!
//! Retries belong to the pipeline: configure them with a retry strategy and
//! turn off the cache layer's own retry option, so a failing request is not
//! retried twice over.
//!
//! # Example
//!
//! ```no_run
//! use safe_fetch::{query, Client, RequestOptions};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Todo { id: u64, title: String }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .build()?;
//!
//! let fetch_todos = query::query_fn::<Vec<Todo>>(&client, "/todos", RequestOptions::new());
//! let todos = fetch_todos().await?;
//!
//! let create_todo = query::mutation_fn::<Todo, _>(&client, "/todos", RequestOptions::new());
//! let created = create_todo(Some(serde_json::json!({ "title": "write docs" }))).await?;
//! println!("{} todos, created #{}", todos.len(), created.id);
//! # Ok(())
//! # }
//! ```

use crate::{Client, NormalizedError, RequestOptions, SafeResult};
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;

/// The future returned by query and mutation functions.
pub type CallFuture<T> = Pin<Box<dyn Future<Output = Result<T, NormalizedError>> + Send>>;

/// Returns the data of a successful call, or its normalized error.
pub fn unwrap<T>(result: SafeResult<T>) -> Result<T, NormalizedError> {
    match result {
        SafeResult::Success(response) => Ok(response.data),
        SafeResult::Failure(failure) => Err(failure.error),
    }
}

/// Binds `url` and `options` into a zero-argument query function.
///
/// Every invocation performs a fresh call with the same options.
pub fn query_fn<T>(
    client: &Client,
    url: impl Into<String>,
    options: RequestOptions<T>,
) -> impl Fn() -> CallFuture<T> + Clone + Send + Sync
where
    T: DeserializeOwned + Send + 'static,
{
    let client = client.clone();
    let url = url.into();

    move || -> CallFuture<T> {
        let client = client.clone();
        let url = url.clone();
        let options = options.clone();
        Box::pin(async move { unwrap(client.call(&url, options).await) })
    }
}

/// Binds `url` and `options` into a one-argument mutation function taking
/// an optional request body.
///
/// The method defaults to POST when `options` does not set one. A body is
/// sent as JSON; `None` keeps whatever body `options` carries.
pub fn mutation_fn<T, B>(
    client: &Client,
    url: impl Into<String>,
    options: RequestOptions<T>,
) -> impl Fn(Option<B>) -> CallFuture<T> + Clone + Send + Sync
where
    T: DeserializeOwned + Send + 'static,
    B: Serialize,
{
    let client = client.clone();
    let url = url.into();
    let options = match options.method_ref() {
        Some(_) => options,
        None => options.method(Method::POST),
    };

    move |body: Option<B>| -> CallFuture<T> {
        let client = client.clone();
        let url = url.clone();
        let options = match body {
            Some(body) => options.clone().json(&body),
            None => options.clone(),
        };
        Box::pin(async move { unwrap(client.call(&url, options).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, RawResponse, Request, Transport, TransportError};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    /// Records every request and answers with a fixed status and body.
    #[derive(Clone)]
    struct Recorder {
        status: StatusCode,
        body: &'static str,
        seen: Arc<Mutex<Vec<Request>>>,
    }

    impl Recorder {
        fn new(status: StatusCode, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(
            &self,
            request: &Request,
            _cancel: CancellationToken,
        ) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(RawResponse::new(
                self.status,
                request.url.clone(),
                HeaderMap::new(),
                Bytes::from_static(self.body.as_bytes()),
            ))
        }
    }

    fn client(transport: Recorder) -> Client {
        Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .transport(transport)
            .build()
            .unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Todo {
        id: u64,
    }

    #[tokio::test]
    async fn query_fn_unwraps_data() {
        let transport = Recorder::new(StatusCode::OK, r#"{"id":7}"#);
        let client = client(transport.clone());

        let fetch = query_fn::<Todo>(&client, "/todos/7", RequestOptions::new());
        assert_eq!(fetch().await.unwrap(), Todo { id: 7 });
        assert_eq!(fetch().await.unwrap(), Todo { id: 7 });

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].url.as_str(), "https://api.example.com/todos/7");
    }

    #[tokio::test]
    async fn query_fn_surfaces_normalized_error() {
        let client = client(Recorder::new(StatusCode::NOT_FOUND, r#"{"error":"nope"}"#));

        let fetch = query_fn::<Todo>(&client, "/todos/404", RequestOptions::new());
        let err = fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn mutation_fn_defaults_to_post_with_json_body() {
        let transport = Recorder::new(StatusCode::CREATED, r#"{"id":1}"#);
        let client = client(transport.clone());

        let create = mutation_fn::<Todo, _>(&client, "/todos", RequestOptions::new());
        let created = create(Some(serde_json::json!({ "title": "a" })))
            .await
            .unwrap();
        assert_eq!(created, Todo { id: 1 });

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].headers.get("content-type").unwrap(), "application/json");
        assert_eq!(
            seen[0].body.as_deref(),
            Some(br#"{"title":"a"}"#.as_slice())
        );
    }

    #[tokio::test]
    async fn mutation_fn_keeps_explicit_method() {
        let transport = Recorder::new(StatusCode::OK, r#"{"id":2}"#);
        let client = client(transport.clone());

        let options = RequestOptions::new().method(Method::PUT).query("v", 2);
        let update = mutation_fn::<Todo, _>(&client, "/todos/2", options);
        update(Some(serde_json::json!({ "done": true }))).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::PUT);
        assert_eq!(seen[0].url.query(), Some("v=2"));
    }

    #[tokio::test]
    async fn mutation_fn_without_body_sends_none() {
        let transport = Recorder::new(StatusCode::OK, r#"{"id":3}"#);
        let client = client(transport.clone());

        let archive = mutation_fn::<Todo, serde_json::Value>(
            &client,
            "/todos/3/archive",
            RequestOptions::new(),
        );
        assert_eq!(archive(None).await.unwrap(), Todo { id: 3 });

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert!(seen[0].body.is_none());
        assert!(seen[0].headers.get("content-type").is_none());
    }

    #[test]
    fn unwrap_failure_returns_error() {
        let result: SafeResult<()> = SafeResult::Failure(crate::Failure {
            error: NormalizedError::validation(None),
            response: None,
            attempts: 1,
        });
        assert_eq!(unwrap(result).unwrap_err().message(), "Validation failed");
    }
}
