//! Error types for the request pipeline.
//!
//! Every failure a call can end in is reported as a [`NormalizedError`], a
//! closed enum with exactly four variants. Misconfiguration of the client
//! itself (bad base URL, invalid header) is reported separately through
//! [`Error`] when the client is being built.

use crate::parse::Body;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A shared, type-erased error used as the cause of a [`NormalizedError`].
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// A boxed error returned by validators and interceptors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message used for every transport failure.
pub(crate) const NETWORK_FAILED: &str = "Network request failed";

/// Message used when the caller cancels a call.
pub(crate) const REQUEST_ABORTED: &str = "Request aborted";

/// Message used when a validator rejects a parsed body.
pub(crate) const VALIDATION_FAILED: &str = "Validation failed";

/// The four kinds of failure a call can end in.
///
/// Returned by [`NormalizedError::kind`]. Useful for comparing errors
/// without caring about their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport failed before a response was obtained.
    Network,
    /// A per-attempt or total deadline elapsed.
    Timeout,
    /// A response was obtained but it indicates failure.
    Http,
    /// The parsed response was rejected by validation.
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "NetworkError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Http => "HttpError",
            ErrorKind::Validation => "ValidationError",
        };
        f.write_str(name)
    }
}

/// The normalized error produced for every terminal failure of a call.
///
/// # Examples
///
/// ```no_run
/// use safe_fetch::{Client, NormalizedError, RequestOptions, SafeResult};
///
/// # async fn example() -> Result<(), safe_fetch::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint", RequestOptions::new()).await {
///     SafeResult::Success(response) => println!("Success: {:?}", response.data),
///     SafeResult::Failure(failure) => match failure.error {
///         NormalizedError::Http { status, body, .. } => {
///             eprintln!("HTTP error {}: {:?}", status, body);
///         }
///         NormalizedError::Timeout { timeout, .. } => {
///             eprintln!("Gave up after {:?}", timeout);
///         }
///         NormalizedError::Network { message, .. }
///         | NormalizedError::Validation { message, .. } => eprintln!("{}", message),
///     },
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum NormalizedError {
    /// The transport failed before any response was obtained.
    ///
    /// Also produced when the caller cancels the call or when the request
    /// could not be constructed (unparseable URL, unserializable body).
    #[error("{message}")]
    Network {
        /// Human readable description.
        message: String,
        /// The underlying transport error.
        #[source]
        cause: Option<Cause>,
    },

    /// A deadline elapsed before the call settled.
    #[error("{message}")]
    Timeout {
        /// Human readable description, stating the elapsed bound.
        message: String,
        /// The configured duration that fired.
        timeout: Duration,
        /// Optional underlying error.
        #[source]
        cause: Option<Cause>,
    },

    /// A response was obtained, but its status indicates failure or its
    /// body could not be decoded.
    #[error("{message}")]
    Http {
        /// Human readable description.
        message: String,
        /// The HTTP status code of the response.
        status: StatusCode,
        /// The reason phrase of the response.
        status_text: String,
        /// The best-effort parsed response body.
        body: Option<Body>,
        /// The decode error, when the body could not be parsed.
        #[source]
        cause: Option<Cause>,
    },

    /// The response was parsed but failed validation.
    #[error("{message}")]
    Validation {
        /// Human readable description.
        message: String,
        /// The validator's own error.
        #[source]
        cause: Option<Cause>,
    },
}

impl NormalizedError {
    /// Creates a `Network` error wrapping a transport failure.
    pub fn network(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        NormalizedError::Network {
            message: NETWORK_FAILED.to_string(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Creates the `Network` error reported when the caller cancels a call.
    pub fn aborted() -> Self {
        NormalizedError::Network {
            message: REQUEST_ABORTED.to_string(),
            cause: None,
        }
    }

    /// Creates a `Timeout` error for the deadline that fired.
    pub fn timeout(timeout: Duration) -> Self {
        NormalizedError::Timeout {
            message: format!("Request timed out after {} ms", timeout.as_millis()),
            timeout,
            cause: None,
        }
    }

    /// Creates an `Http` error for a non-2xx response.
    pub fn http(status: StatusCode, status_text: impl Into<String>, body: Option<Body>) -> Self {
        let status_text = status_text.into();
        let message = if status_text.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {} {}", status.as_u16(), status_text)
        };
        NormalizedError::Http {
            message,
            status,
            status_text,
            body,
            cause: None,
        }
    }

    /// Creates an `Http` error for a response whose body could not be decoded.
    pub fn decode(
        status: StatusCode,
        status_text: impl Into<String>,
        body: Option<Body>,
        cause: Cause,
    ) -> Self {
        NormalizedError::Http {
            message: "Failed to parse response body".to_string(),
            status,
            status_text: status_text.into(),
            body,
            cause: Some(cause),
        }
    }

    /// Creates a `Validation` error with the fixed "Validation failed" message.
    pub fn validation(cause: Option<Cause>) -> Self {
        NormalizedError::Validation {
            message: VALIDATION_FAILED.to_string(),
            cause,
        }
    }

    /// Returns which of the four kinds this error is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NormalizedError::Network { .. } => ErrorKind::Network,
            NormalizedError::Timeout { .. } => ErrorKind::Timeout,
            NormalizedError::Http { .. } => ErrorKind::Http,
            NormalizedError::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        match self {
            NormalizedError::Network { message, .. }
            | NormalizedError::Timeout { message, .. }
            | NormalizedError::Http { message, .. }
            | NormalizedError::Validation { message, .. } => message,
        }
    }

    /// Returns the underlying cause, if any.
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            NormalizedError::Network { cause, .. }
            | NormalizedError::Timeout { cause, .. }
            | NormalizedError::Http { cause, .. }
            | NormalizedError::Validation { cause, .. } => cause.as_ref(),
        }
    }

    /// Returns the HTTP status code for `Http` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            NormalizedError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns a copy of this error with its message replaced.
    ///
    /// Handy inside an error mapper, which may rewrite messages but must
    /// keep the variant.
    pub fn with_message(mut self, new_message: impl Into<String>) -> Self {
        match &mut self {
            NormalizedError::Network { message, .. }
            | NormalizedError::Timeout { message, .. }
            | NormalizedError::Http { message, .. }
            | NormalizedError::Validation { message, .. } => *message = new_message.into(),
        }
        self
    }
}

/// An error raised by a [`Transport`](crate::Transport) while performing
/// one exchange.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The underlying HTTP client failed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The exchange was aborted through its cancellation token.
    #[error("Request was cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Errors raised while configuring a client.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration was provided.
    ///
    /// This indicates a problem with how the client or request was configured,
    /// such as invalid header names or values.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A specialized `Result` type for client configuration.
pub type Result<T> = std::result::Result<T, Error>;
