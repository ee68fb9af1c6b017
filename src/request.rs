//! Request descriptors and per-call options.
//!
//! [`RequestOptions`] holds everything a single call may override. The client
//! merges those options with its own defaults into a [`Request`], which is
//! built once and sent unchanged on every attempt.

use crate::error::{Cause, NormalizedError};
use crate::parse::{ParseAs, Validator, ValidateResult};
use crate::retry::RetryStrategy;
use crate::Body;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Ordered query parameters.
///
/// A key set to `None` is kept during merging, so it can shadow a default,
/// but is dropped when the query string is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, Option<String>)>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place or appending.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Adds a query parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, Some(value.to_string()));
        self
    }

    /// Adds a query parameter that may be absent.
    pub fn with_opt(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.set(key, value.map(|v| v.to_string()));
        self
    }

    /// Returns a new query with `overrides` applied on top of `self`.
    pub fn merged(&self, overrides: &Query) -> Query {
        let mut merged = self.clone();
        for (key, value) in &overrides.pairs {
            merged.set(key.clone(), value.clone());
        }
        merged
    }

    /// Iterates over the parameters that have a value.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    /// Returns `true` if no parameter has a value.
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Text, sent as UTF-8.
    Text(String),
    /// A structured value, serialized to JSON. Adds
    /// `Content-Type: application/json` unless a content type is set.
    Json(serde_json::Value),
}

impl RequestBody {
    /// Serializes `body` into a JSON request body.
    pub fn json<B: Serialize + ?Sized>(body: &B) -> serde_json::Result<Self> {
        serde_json::to_value(body).map(RequestBody::Json)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

/// Per-call options. Every field left unset falls back to the client's
/// default; nothing set here changes the client.
///
/// `T` is the data type the call produces.
///
/// # Examples
///
/// ```
/// use safe_fetch::{Backoff, ParseAs, RequestOptions};
/// use std::time::Duration;
///
/// let options = RequestOptions::<String>::new()
///     .query("page", 1)
///     .query("limit", 10)
///     .header("X-Request-Id", "abc-123")
///     .unwrap()
///     .parse_as(ParseAs::Text)
///     .timeout(Duration::from_secs(5))
///     .retries(Backoff::new(2));
/// ```
pub struct RequestOptions<T = serde_json::Value> {
    pub(crate) method: Option<Method>,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Query,
    pub(crate) body: Option<RequestBody>,
    pub(crate) body_error: Option<Cause>,
    pub(crate) parse_as: Option<ParseAs>,
    pub(crate) validate: Option<Validator<T>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) total_timeout: Option<Duration>,
    pub(crate) retries: Option<RetryStrategy>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl<T> RequestOptions<T> {
    /// Creates empty options.
    pub fn new() -> Self {
        Self {
            method: None,
            headers: HeaderMap::new(),
            query: Query::new(),
            body: None,
            body_error: None,
            parse_as: None,
            validate: None,
            timeout: None,
            total_timeout: None,
            retries: None,
            cancel: None,
        }
    }

    /// Sets the HTTP method. Defaults to GET.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Returns the method set on these options, if any.
    pub fn method_ref(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Adds a header, shadowing a client default with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> crate::Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header name: {}", e))
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header value: {}", e))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds all headers from `headers`.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Adds a query parameter, overriding a client default with the same key.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.set(key, Some(value.to_string()));
        self
    }

    /// Adds a query parameter that may be absent. An absent value also
    /// removes a client default with the same key.
    pub fn query_opt(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.query.set(key, value.map(|v| v.to_string()));
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self.body_error = None;
        self
    }

    /// Serializes `body` as JSON and sets it as the request body.
    ///
    /// A serialization failure is reported when the call runs, as a
    /// `Network` error.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match RequestBody::json(body) {
            Ok(body) => {
                self.body = Some(body);
                self.body_error = None;
            }
            Err(e) => {
                self.body = None;
                self.body_error = Some(Arc::new(e));
            }
        }
        self
    }

    /// Sets how the response body is parsed.
    pub fn parse_as(mut self, parse_as: ParseAs) -> Self {
        self.parse_as = Some(parse_as);
        self
    }

    /// Sets the validator that turns the parsed body into `T`.
    pub fn validate(mut self, validator: Validator<T>) -> Self {
        self.validate = Some(validator);
        self
    }

    /// Sets a validation function that turns the parsed body into `T`.
    pub fn validate_with<F>(self, f: F) -> Self
    where
        F: Fn(&Body) -> ValidateResult<T> + Send + Sync + 'static,
    {
        self.validate(Validator::new(f))
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the total timeout across all attempts and backoff waits.
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Sets the retry strategy for this call.
    pub fn retries(mut self, strategy: impl Into<RetryStrategy>) -> Self {
        self.retries = Some(strategy.into());
        self
    }

    /// Sets a token that aborts the call when cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<T> Default for RequestOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            body_error: self.body_error.clone(),
            parse_as: self.parse_as,
            validate: self.validate.clone(),
            timeout: self.timeout,
            total_timeout: self.total_timeout,
            retries: self.retries.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("parse_as", &self.parse_as)
            .field("validate", &self.validate.is_some())
            .field("timeout", &self.timeout)
            .field("total_timeout", &self.total_timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// A fully resolved request, identical for every attempt of a call.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,
    /// The target URL, query string included.
    pub url: Url,
    /// The merged headers.
    pub headers: HeaderMap,
    /// The encoded body.
    pub body: Option<Bytes>,
}

impl Request {
    /// Merges client defaults with per-call options.
    pub(crate) fn build<T>(
        base_url: Option<&Url>,
        default_headers: &HeaderMap,
        default_query: &Query,
        target: &str,
        options: &RequestOptions<T>,
    ) -> Result<Request, NormalizedError> {
        if let Some(cause) = &options.body_error {
            return Err(NormalizedError::Network {
                message: "Failed to serialize request body".to_string(),
                cause: Some(Arc::clone(cause)),
            });
        }

        let mut url = resolve_url(base_url, target).map_err(|e| NormalizedError::Network {
            message: "Invalid request URL".to_string(),
            cause: Some(Arc::new(e)),
        })?;
        let query = default_query.merged(&options.query);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.present());
        }

        let mut headers = merge_headers(default_headers, &options.headers);

        let body = match &options.body {
            None => None,
            Some(RequestBody::Bytes(bytes)) => Some(bytes.clone()),
            Some(RequestBody::Text(text)) => Some(Bytes::from(text.clone())),
            Some(RequestBody::Json(value)) => {
                let encoded = serde_json::to_vec(value).map_err(|e| NormalizedError::Network {
                    message: "Failed to serialize request body".to_string(),
                    cause: Some(Arc::new(e)),
                })?;
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(Bytes::from(encoded))
            }
        };

        Ok(Request {
            method: options.method.clone().unwrap_or(Method::GET),
            url,
            headers,
            body,
        })
    }
}

/// Joins `target` onto `base`. Absolute targets are used as-is.
fn resolve_url(base: Option<&Url>, target: &str) -> Result<Url, url::ParseError> {
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute);
    }
    match base {
        Some(base) => {
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                target.trim_start_matches('/')
            );
            Url::parse(&joined)
        }
        None => Url::parse(target),
    }
}

/// Returns `defaults` with every header named in `overrides` replaced.
fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
    }
    for (name, value) in overrides {
        merged.append(name.clone(), value.clone());
    }
    merged
}
