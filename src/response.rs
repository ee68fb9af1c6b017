//! Response types returned by the pipeline.
//!
//! Every call resolves to a [`SafeResult`]: either a [`Response`] wrapping the
//! validated data together with the raw response and call metadata, or a
//! [`Failure`] carrying the normalized error.

use crate::{ErrorKind, NormalizedError};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use url::Url;

/// A raw HTTP response as produced by a [`Transport`](crate::Transport).
///
/// The body has already been read in full; cloning is cheap.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The reason phrase.
    pub status_text: String,
    /// The response headers.
    pub headers: HeaderMap,
    /// The URL that was requested.
    pub url: Url,
    /// The unparsed response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a raw response, using the canonical reason phrase of
    /// `status` as its status text.
    pub fn new(status: StatusCode, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            url,
            body,
        }
    }

    /// Returns a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns `true` if the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A successful call.
///
/// This type provides both the validated response data and metadata about
/// the call, including latency, attempt count and the raw response.
///
/// # Examples
///
/// ```no_run
/// use safe_fetch::{Client, RequestOptions};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), safe_fetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// if let Some(user) = client.get::<User>("/users/123", RequestOptions::new()).await.ok() {
///     println!("User: {}", user.data.name);
///     println!("Request took {:?}", user.latency);
///     println!("Status: {}", user.status());
///     println!("Retry attempts: {}", user.attempts);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The validated response data.
    pub data: T,

    /// The raw response the data was parsed from.
    pub raw: RawResponse,

    /// The total latency of the call, including all retry attempts and
    /// backoff waits.
    pub latency: Duration,

    /// The number of attempts made to complete this call.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(data: T, raw: RawResponse, latency: Duration, attempts: usize) -> Self {
        Self {
            data,
            raw,
            latency,
            attempts,
        }
    }

    /// Returns the HTTP status code of the response.
    pub fn status(&self) -> StatusCode {
        self.raw.status
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use safe_fetch::{RawResponse, Response};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let raw = RawResponse::new(
    ///     StatusCode::OK,
    ///     "https://api.example.com/n".parse().unwrap(),
    ///     HeaderMap::new(),
    ///     "42".into(),
    /// );
    /// let response = Response::new(42, raw, Duration::from_millis(100), 1);
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw: self.raw,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw.header(name)
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// A failed call.
#[derive(Debug, Clone)]
pub struct Failure {
    /// The normalized error.
    pub error: NormalizedError,

    /// The raw response, present for `Http` and `Validation` errors.
    pub response: Option<RawResponse>,

    /// The number of attempts made before giving up.
    pub attempts: usize,
}

impl Failure {
    /// Returns which kind of error ended the call.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// The uniform outcome of every call.
///
/// The pipeline never returns a Rust error or panics past its boundary;
/// every failure is reported as [`SafeResult::Failure`].
#[derive(Debug, Clone)]
pub enum SafeResult<T> {
    /// Status was 2xx, the body parsed and validation succeeded.
    Success(Response<T>),
    /// The call failed.
    Failure(Failure),
}

impl<T> SafeResult<T> {
    /// Returns `true` for a successful call.
    pub fn is_ok(&self) -> bool {
        matches!(self, SafeResult::Success(_))
    }

    /// Returns `true` for a failed call.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Returns the successful response, discarding any failure.
    pub fn ok(self) -> Option<Response<T>> {
        match self {
            SafeResult::Success(response) => Some(response),
            SafeResult::Failure(_) => None,
        }
    }

    /// Returns the data of a successful call.
    pub fn data(&self) -> Option<&T> {
        match self {
            SafeResult::Success(response) => Some(&response.data),
            SafeResult::Failure(_) => None,
        }
    }

    /// Returns the error of a failed call.
    pub fn error(&self) -> Option<&NormalizedError> {
        match self {
            SafeResult::Success(_) => None,
            SafeResult::Failure(failure) => Some(&failure.error),
        }
    }

    /// Returns the raw response, if one was obtained.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            SafeResult::Success(response) => Some(&response.raw),
            SafeResult::Failure(failure) => failure.response.as_ref(),
        }
    }

    /// Returns the number of attempts the call made.
    pub fn attempts(&self) -> usize {
        match self {
            SafeResult::Success(response) => response.attempts,
            SafeResult::Failure(failure) => failure.attempts,
        }
    }

    /// Converts into a standard `Result`, keeping the full success and
    /// failure payloads.
    pub fn into_result(self) -> Result<Response<T>, Failure> {
        match self {
            SafeResult::Success(response) => Ok(response),
            SafeResult::Failure(failure) => Err(failure),
        }
    }

    /// Maps the data of a successful call.
    pub fn map<U, F>(self, f: F) -> SafeResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            SafeResult::Success(response) => SafeResult::Success(response.map(f)),
            SafeResult::Failure(failure) => SafeResult::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn raw(status: StatusCode) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        RawResponse::new(
            status,
            Url::parse("https://api.example.com/test").unwrap(),
            headers,
            Bytes::from_static(b"{}"),
        )
    }

    #[test]
    fn raw_response_uses_canonical_reason() {
        let response = raw(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.status_text, "Internal Server Error");
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert!(!response.is_success());
    }

    #[test]
    fn success_accessors() {
        let result = SafeResult::Success(Response::new(
            7u32,
            raw(StatusCode::OK),
            Duration::from_millis(5),
            3,
        ));

        assert!(result.is_ok());
        assert_eq!(result.data(), Some(&7));
        assert_eq!(result.attempts(), 3);
        assert_eq!(result.response().map(|r| r.status), Some(StatusCode::OK));

        let response = result.map(|n| n * 2).ok().unwrap();
        assert_eq!(*response, 14);
        assert!(response.was_retried());
    }

    #[test]
    fn failure_accessors() {
        let result: SafeResult<u32> = SafeResult::Failure(Failure {
            error: NormalizedError::timeout(Duration::from_secs(1)),
            response: None,
            attempts: 1,
        });

        assert!(result.is_err());
        assert!(result.data().is_none());
        assert!(result.response().is_none());
        assert_eq!(result.error().map(NormalizedError::kind), Some(ErrorKind::Timeout));
        assert_eq!(result.into_result().unwrap_err().kind(), ErrorKind::Timeout);
    }
}
