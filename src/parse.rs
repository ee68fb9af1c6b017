//! Response body parsing and validation.
//!
//! A raw response body is first parsed into a [`Body`] according to the
//! requested [`ParseAs`] representation. The parsed body is then turned
//! into the caller's data type, either by a [`Validator`] or by serde.

use crate::error::{BoxError, Cause};
use bytes::Bytes;
use serde::de::{value::BytesDeserializer, value::UnitDeserializer, DeserializeOwned};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// How the response body should be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseAs {
    /// Parse the body as JSON. An empty body parses as `null`.
    #[default]
    Json,
    /// Decode the body as UTF-8 text.
    Text,
    /// Keep the body as raw bytes.
    Bytes,
    /// Do not parse the body; the caller reads the raw response.
    Response,
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A JSON document.
    Json(serde_json::Value),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// The body was left unparsed; see the raw response.
    Raw,
}

impl Body {
    /// Returns the JSON value, if this body was parsed as JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if this body was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// JSON bodies deserialize directly, text bodies deserialize as a JSON
    /// string, byte bodies through `deserialize_bytes` (use [`Bytes`] as the
    /// target) and unparsed bodies as unit (use `()` or an `Option`).
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self {
            Body::Json(value) => serde_json::from_value(value),
            Body::Text(text) => serde_json::from_value(serde_json::Value::String(text)),
            Body::Bytes(bytes) => T::deserialize(BytesDeserializer::<serde_json::Error>::new(&bytes)),
            Body::Raw => T::deserialize(UnitDeserializer::<serde_json::Error>::new()),
        }
    }
}

/// Parses a raw body strictly according to `parse_as`.
pub(crate) fn parse_body(raw: &Bytes, parse_as: ParseAs) -> Result<Body, Cause> {
    match parse_as {
        ParseAs::Json => {
            if raw.iter().all(u8::is_ascii_whitespace) {
                return Ok(Body::Json(serde_json::Value::Null));
            }
            serde_json::from_slice(raw)
                .map(Body::Json)
                .map_err(|e| Arc::new(e) as Cause)
        }
        ParseAs::Text => String::from_utf8(raw.to_vec())
            .map(Body::Text)
            .map_err(|e| Arc::new(e) as Cause),
        ParseAs::Bytes => Ok(Body::Bytes(raw.clone())),
        ParseAs::Response => Ok(Body::Raw),
    }
}

/// Parses a body without failing, falling back to lossy text.
///
/// Used for the body attached to an HTTP error.
pub(crate) fn parse_lenient(raw: &Bytes, parse_as: ParseAs) -> Body {
    match parse_as {
        ParseAs::Response => Body::Bytes(raw.clone()),
        other => parse_body(raw, other).unwrap_or_else(|_| text_lossy(raw)),
    }
}

pub(crate) fn text_lossy(raw: &Bytes) -> Body {
    Body::Text(String::from_utf8_lossy(raw).into_owned())
}

/// The outcome of a validator: the validated data, or the reason it was
/// rejected.
pub type ValidateResult<T> = std::result::Result<T, BoxError>;

/// Converts a parsed body into the caller's data type, rejecting bodies
/// that do not satisfy the caller's rules.
///
/// # Examples
///
/// ```
/// use safe_fetch::{Body, Validator};
///
/// let validator = Validator::new(|body: &Body| {
///     let id = body
///         .as_json()
///         .and_then(|v| v.get("id"))
///         .and_then(|v| v.as_u64())
///         .ok_or("missing id field")?;
///     Ok(id)
/// });
///
/// let body = Body::Json(serde_json::json!({ "id": 7 }));
/// assert_eq!(validator.validate(&body).unwrap(), 7);
/// ```
pub struct Validator<T> {
    inner: Arc<dyn Fn(&Body) -> ValidateResult<T> + Send + Sync>,
}

impl<T> Validator<T> {
    /// Wraps a validation function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Body) -> ValidateResult<T> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Runs the validator against a parsed body.
    ///
    /// A validator that panics is treated as rejecting the body.
    pub fn validate(&self, body: &Body) -> ValidateResult<T> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.inner)(body))) {
            Ok(result) => result,
            Err(payload) => {
                Err(format!("validator panicked: {}", panic_message(&*payload)).into())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}
