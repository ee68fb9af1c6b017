//! HTTP client with deadlines, retry logic and normalized errors.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    interceptor::{Interceptor, Interceptors},
    parse::{self, ParseAs, Validator},
    request::{Query, Request, RequestOptions},
    response::{Failure, RawResponse, Response, SafeResult},
    retry::{self, RetryContext, RetryStrategy},
    transport::{ReqwestTransport, Transport},
    Error, NormalizedError, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Rewrites a normalized error before it reaches interceptors and callers.
///
/// The mapper may change the message or cause, but not the kind of error.
pub type ErrorMapper = Arc<dyn Fn(NormalizedError) -> NormalizedError + Send + Sync>;

/// An HTTP client that turns every call into a [`SafeResult`].
///
/// The client is designed to be reused across multiple requests. Cloning it
/// is cheap; all clones share the same immutable configuration and
/// transport, so concurrent calls never interfere with each other.
///
/// # Examples
///
/// ```no_run
/// use safe_fetch::{Backoff, Client, RequestOptions, SafeResult};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
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
///     .timeout(Duration::from_secs(5))
///     .total_timeout(Duration::from_secs(30))
///     .retry_strategy(Backoff::new(3).max_delay(Duration::from_secs(2)))
///     .build()?;
///
/// // GET request
/// match client.get::<User>("/users/123", RequestOptions::new()).await {
///     SafeResult::Success(user) => println!("User: {}", user.data.name),
///     SafeResult::Failure(failure) => eprintln!("{}: {}", failure.kind(), failure.error),
/// }
///
/// // POST request
/// let new_user = CreateUser { name: "Alice".to_string() };
/// let created = client
///     .post::<User, _>("/users", &new_user, RequestOptions::new())
///     .await;
/// if let Some(user) = created.data() {
///     println!("Created user with ID: {}", user.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    default_query: Query,
    timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    retry_strategy: RetryStrategy,
    parse_as: ParseAs,
    error_map: Option<ErrorMapper>,
    interceptors: Interceptors,
}

/// The effective settings of one call: per-call options over client defaults.
struct CallSettings {
    timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    retries: RetryStrategy,
    parse_as: ParseAs,
}

/// How the retry loop ended.
enum Settled {
    /// A response was obtained and is not going to be retried.
    Response(RawResponse),
    /// No response; retries were exhausted, refused, or the call was aborted.
    Failed(NormalizedError),
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use safe_fetch::Client;
    ///
    /// # fn example() -> Result<(), safe_fetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Makes a call.
    ///
    /// This is the main method for making requests. It builds the request,
    /// runs the attempts under the configured deadlines and retry strategy,
    /// parses and validates the response, and normalizes any failure. It
    /// never panics or returns early with a Rust error; every outcome is a
    /// [`SafeResult`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use safe_fetch::{Client, RequestOptions};
    /// use http::Method;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct SearchResults { results: Vec<String> }
    ///
    /// # async fn example() -> Result<(), safe_fetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let options = RequestOptions::new()
    ///     .method(Method::POST)
    ///     .json(&serde_json::json!({ "query": "rust" }));
    ///
    /// let result = client.call::<SearchResults>("/search", options).await;
    /// if let Some(found) = result.data() {
    ///     println!("Found {} results", found.results.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<T>(&self, url: &str, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
    {
        let settings = self.settings(&options);

        let request = match Request::build(
            self.inner.base_url.as_ref(),
            &self.inner.default_headers,
            &self.inner.default_query,
            url,
            &options,
        ) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(error = %error, url = url, "Failed to build request");
                return self.fail(error, None, 0).await;
            }
        };

        self.inner.interceptors.request(&request).await;

        let token = options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let start_time = Instant::now();
        let mut attempts = 0;

        let settled = match settings.total_timeout {
            Some(total) => {
                let run = self.run_attempts(&request, &settings, &token, &mut attempts);
                let outcome = tokio::time::timeout(total, run).await;
                match outcome {
                    Ok(settled) => settled,
                    Err(_) => {
                        token.cancel();
                        tracing::warn!(
                            total_timeout_ms = total.as_millis(),
                            method = %request.method,
                            url = %request.url,
                            "Total timeout elapsed"
                        );
                        Settled::Failed(NormalizedError::timeout(total))
                    }
                }
            }
            None => {
                self.run_attempts(&request, &settings, &token, &mut attempts)
                    .await
            }
        };

        let latency = start_time.elapsed();
        match settled {
            Settled::Failed(error) => self.fail(error, None, attempts).await,
            Settled::Response(response) => {
                self.process(
                    response,
                    settings.parse_as,
                    options.validate.as_ref(),
                    latency,
                    attempts,
                )
                .await
            }
        }
    }

    /// Runs attempts until one settles or the retry strategy gives up.
    ///
    /// Status-based retry decisions are made here, before any body parsing.
    async fn run_attempts(
        &self,
        request: &Request,
        settings: &CallSettings,
        token: &CancellationToken,
        attempts: &mut usize,
    ) -> Settled {
        let mut attempt = 0;

        loop {
            *attempts = attempt + 1;

            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Executing HTTP request"
            );

            let delay = match self.attempt(request, settings.timeout, token).await {
                Ok(response) => {
                    self.inner.interceptors.response(&response).await;

                    let ctx = RetryContext {
                        attempt,
                        method: &request.method,
                        error: None,
                        response: Some(&response),
                    };
                    if response.is_success() || !settings.retries.should_retry(&ctx) {
                        return Settled::Response(response);
                    }

                    tracing::warn!(
                        status = response.status.as_u16(),
                        attempt = attempt + 1,
                        method = %request.method,
                        url = %request.url,
                        "Retryable response status"
                    );

                    match retry::retry_after(&response.headers) {
                        Some(server_delay) => {
                            tracing::info!(
                                retry_after_ms = server_delay.as_millis(),
                                attempt = attempt + 1,
                                "Server requested a retry delay"
                            );
                            server_delay
                        }
                        None => settings.retries.delay_for_attempt(attempt),
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt + 1,
                        method = %request.method,
                        url = %request.url,
                        "Request failed"
                    );

                    if token.is_cancelled() {
                        return Settled::Failed(error);
                    }

                    let ctx = RetryContext {
                        attempt,
                        method: &request.method,
                        error: Some(&error),
                        response: None,
                    };
                    if !settings.retries.should_retry(&ctx) {
                        return Settled::Failed(error);
                    }
                    settings.retries.delay_for_attempt(attempt)
                }
            };

            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt + 1,
                "Retrying request after delay"
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => return Settled::Failed(NormalizedError::aborted()),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// Executes a single attempt under the per-attempt timeout.
    ///
    /// Each attempt gets a child of the call token, so cancelling the call
    /// also cancels the exchange in flight.
    async fn attempt(
        &self,
        request: &Request,
        timeout: Option<Duration>,
        call_token: &CancellationToken,
    ) -> std::result::Result<RawResponse, NormalizedError> {
        let attempt_token = call_token.child_token();
        let send = self.inner.transport.send(request, attempt_token.clone());

        let outcome = match timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = call_token.cancelled() => None,
                result = tokio::time::timeout(limit, send) => match result {
                    Ok(result) => Some(result),
                    Err(_) => {
                        attempt_token.cancel();
                        return Err(NormalizedError::timeout(limit));
                    }
                },
            },
            None => tokio::select! {
                biased;
                _ = call_token.cancelled() => None,
                result = send => Some(result),
            },
        };

        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(NormalizedError::network(e)),
            None => {
                attempt_token.cancel();
                Err(NormalizedError::aborted())
            }
        }
    }

    /// Parses and validates a settled response.
    async fn process<T>(
        &self,
        response: RawResponse,
        parse_as: ParseAs,
        validate: Option<&Validator<T>>,
        latency: Duration,
        attempts: usize,
    ) -> SafeResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status;

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        // Non-2xx responses skip validation entirely
        if !status.is_success() {
            let body = parse::parse_lenient(&response.body, parse_as);

            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), body = ?body, "Client error (4xx)");
            } else if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), body = ?body, "Server error (5xx)");
            }

            let error = NormalizedError::http(status, response.status_text.clone(), Some(body));
            return self.fail(error, Some(response), attempts).await;
        }

        let body = match parse::parse_body(&response.body, parse_as) {
            Ok(body) => body,
            Err(cause) => {
                tracing::error!(
                    error = %cause,
                    status = status.as_u16(),
                    "Failed to parse response body"
                );
                let error = NormalizedError::decode(
                    status,
                    response.status_text.clone(),
                    Some(parse::text_lossy(&response.body)),
                    cause,
                );
                return self.fail(error, Some(response), attempts).await;
            }
        };

        let data = match validate {
            Some(validator) => validator
                .validate(&body)
                .map_err(|e| NormalizedError::validation(Some(Arc::from(e)))),
            None => body.decode::<T>().map_err(|e| NormalizedError::Validation {
                message: "Response body does not match the expected type".to_string(),
                cause: Some(Arc::new(e)),
            }),
        };

        match data {
            Ok(data) => SafeResult::Success(Response::new(data, response, latency, attempts)),
            Err(error) => {
                tracing::warn!(error = %error, status = status.as_u16(), "Response failed validation");
                self.fail(error, Some(response), attempts).await
            }
        }
    }

    /// Finalizes a failure: applies the error mapper and fires `on_error`.
    async fn fail<T>(
        &self,
        error: NormalizedError,
        response: Option<RawResponse>,
        attempts: usize,
    ) -> SafeResult<T> {
        let error = self.map_error(error);
        self.inner.interceptors.error(&error).await;
        SafeResult::Failure(Failure {
            error,
            response,
            attempts,
        })
    }

    fn map_error(&self, error: NormalizedError) -> NormalizedError {
        let Some(mapper) = &self.inner.error_map else {
            return error;
        };

        let kind = error.kind();
        let mapped = mapper(error.clone());
        if mapped.kind() != kind {
            tracing::warn!(
                original = %kind,
                mapped = %mapped.kind(),
                "Error mapper changed the error kind; keeping the original error"
            );
            return error;
        }
        mapped
    }

    fn settings<T>(&self, options: &RequestOptions<T>) -> CallSettings {
        CallSettings {
            timeout: options.timeout.or(self.inner.timeout),
            total_timeout: options.total_timeout.or(self.inner.total_timeout),
            retries: options
                .retries
                .clone()
                .unwrap_or_else(|| self.inner.retry_strategy.clone()),
            parse_as: options.parse_as.unwrap_or(self.inner.parse_as),
        }
    }

    /// Makes a GET request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use safe_fetch::{Client, RequestOptions};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), safe_fetch::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get::<User>("/users/123", RequestOptions::new()).await;
    /// if let Some(user) = user.data() {
    ///     println!("User: {}", user.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<T>(&self, url: &str, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
    {
        self.call(url, options.method(Method::GET)).await
    }

    /// Makes a HEAD request. Use `()` as the data type.
    pub async fn head<T>(&self, url: &str, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
    {
        self.call(url, options.method(Method::HEAD)).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<T, B>(&self, url: &str, body: &B, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(url, options.method(Method::POST).json(body)).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<T, B>(&self, url: &str, body: &B, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(url, options.method(Method::PUT).json(body)).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<T, B>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions<T>,
    ) -> SafeResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(url, options.method(Method::PATCH).json(body)).await
    }

    /// Makes a DELETE request.
    pub async fn delete<T>(&self, url: &str, options: RequestOptions<T>) -> SafeResult<T>
    where
        T: DeserializeOwned,
    {
        self.call(url, options.method(Method::DELETE)).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use safe_fetch::{Backoff, ClientBuilder, ParseAs};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), safe_fetch::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(10))
///     .total_timeout(Duration::from_secs(30))
///     .retry_strategy(Backoff::new(3).base_delay(Duration::from_millis(200)))
///     .default_header("User-Agent", "my-app/1.0")?
///     .default_query("api-version", "2")
///     .parse_as(ParseAs::Json)
///     .error_map(|e| {
///         let message = format!("api.example.com: {}", e.message());
///         e.with_message(message)
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    default_query: Query,
    timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    retry_strategy: RetryStrategy,
    parse_as: ParseAs,
    error_map: Option<ErrorMapper>,
    interceptors: Interceptors,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            default_query: Query::new(),
            timeout: None,
            total_timeout: None,
            retry_strategy: RetryStrategy::None,
            parse_as: ParseAs::Json,
            error_map: None,
            interceptors: Interceptors::default(),
            transport: None,
        }
    }

    /// Sets the base URL that relative call URLs are joined onto.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Adds a default query parameter that will be included in all requests.
    pub fn default_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.default_query.set(key, Some(value.to_string()));
        self
    }

    /// Sets the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the default total timeout across all attempts of a call.
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Sets the default retry strategy.
    pub fn retry_strategy(mut self, strategy: impl Into<RetryStrategy>) -> Self {
        self.retry_strategy = strategy.into();
        self
    }

    /// Sets the default response representation.
    pub fn parse_as(mut self, parse_as: ParseAs) -> Self {
        self.parse_as = parse_as;
        self
    }

    /// Sets the error mapper applied to every failure.
    pub fn error_map<F>(mut self, mapper: F) -> Self
    where
        F: Fn(NormalizedError) -> NormalizedError + Send + Sync + 'static,
    {
        self.error_map = Some(Arc::new(mapper));
        self
    }

    /// Registers an interceptor. Interceptors fire in registration order.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Replaces the transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url: self.base_url,
                default_headers: self.default_headers,
                default_query: self.default_query,
                timeout: self.timeout,
                total_timeout: self.total_timeout,
                retry_strategy: self.retry_strategy,
                parse_as: self.parse_as,
                error_map: self.error_map,
                interceptors: self.interceptors,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
