//! Retry strategies and predicates for handling transient failures.
//!
//! A [`RetryStrategy`] decides how many attempts a call may make and how long
//! to wait between them. A [`RetryPredicate`] decides whether a particular
//! failed attempt is eligible for another try. When no predicate is given,
//! [`DefaultRetry`] applies.

use crate::{response::RawResponse, ErrorKind, NormalizedError};
use http::{HeaderMap, Method, StatusCode};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Base delay used by [`Backoff::new`].
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

/// Defines whether and how failed attempts are retried.
///
/// # Examples
///
/// ```
/// use safe_fetch::{Backoff, RetryStrategy};
/// use std::time::Duration;
///
/// // No retries
/// let none = RetryStrategy::None;
///
/// // Up to 3 retries: 100ms, 200ms, 400ms, capped at 250ms
/// let backoff: RetryStrategy = Backoff::new(3)
///     .base_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_millis(250))
///     .into();
///
/// assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Do not retry failed attempts.
    #[default]
    None,

    /// Retry with exponentially increasing delays.
    Backoff(Backoff),
}

/// Exponential backoff settings.
///
/// Each retry waits `base_delay * 2^attempt`, capped at `max_delay` when
/// set. A `Retry-After` header on the failed response takes precedence and
/// is not capped.
#[derive(Clone)]
pub struct Backoff {
    /// The maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// The delay before the first retry.
    pub base_delay: Duration,
    /// The maximum delay between retries.
    pub max_delay: Option<Duration>,
    /// Whether to scale computed delays by a random 50-100% factor.
    pub jitter: bool,
    /// Replaces the default eligibility rule when set.
    pub retry_on: Option<Arc<dyn RetryPredicate>>,
}

impl Backoff {
    /// Creates backoff settings allowing `max_retries` retries, with a
    /// 300ms base delay, no cap, no jitter and the default eligibility rule.
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            jitter: false,
            retry_on: None,
        }
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Caps the computed delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Enables or disables jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the default eligibility rule with `predicate`.
    pub fn retry_on(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.retry_on = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("retry_on", &self.retry_on.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl From<Backoff> for RetryStrategy {
    fn from(backoff: Backoff) -> Self {
        RetryStrategy::Backoff(backoff)
    }
}

impl RetryStrategy {
    /// Returns the maximum number of retries.
    pub fn max_retries(&self) -> usize {
        match self {
            RetryStrategy::None => 0,
            RetryStrategy::Backoff(backoff) => backoff.max_retries,
        }
    }

    /// Returns `true` if the attempt described by `ctx` may be retried.
    ///
    /// The attempt index must be below the retry budget and the effective
    /// predicate (custom, or [`DefaultRetry`]) must accept it.
    pub fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        match self {
            RetryStrategy::None => false,
            RetryStrategy::Backoff(backoff) => {
                if ctx.attempt >= backoff.max_retries {
                    return false;
                }
                match &backoff.retry_on {
                    Some(predicate) => predicate.should_retry(ctx),
                    None => DefaultRetry.should_retry(ctx),
                }
            }
        }
    }

    /// Returns the backoff delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Backoff(backoff) => {
                let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
                let multiplier = 2u32.saturating_pow(exponent);
                let mut delay = backoff.base_delay.saturating_mul(multiplier);
                if let Some(max_delay) = backoff.max_delay {
                    delay = delay.min(max_delay);
                }

                if backoff.jitter {
                    // Random value between 50% and 100% of the delay
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    delay.mul_f64(jitter_factor)
                } else {
                    delay
                }
            }
        }
    }
}

/// Everything known about a failed attempt when deciding whether to retry.
///
/// Exactly one of `error` and `response` is set: `error` for transport
/// failures and per-attempt timeouts, `response` for responses whose status
/// may warrant a retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// The index of the attempt that just failed (0 for the first attempt).
    pub attempt: usize,
    /// The method of the request.
    pub method: &'a Method,
    /// The error the attempt produced, if no response was obtained.
    pub error: Option<&'a NormalizedError>,
    /// The response the attempt produced.
    pub response: Option<&'a RawResponse>,
}

impl RetryContext<'_> {
    /// Returns the response status, if a response was obtained.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.map(|response| response.status)
    }

    fn error_kind(&self) -> Option<ErrorKind> {
        self.error.map(NormalizedError::kind)
    }
}

/// Trait for determining whether a failed attempt should be retried.
///
/// # Examples
///
/// ```
/// use safe_fetch::{RetryContext, RetryPredicate};
///
/// struct RetryOnRateLimit;
///
/// impl RetryPredicate for RetryOnRateLimit {
///     fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
///         ctx.status().is_some_and(|status| status.as_u16() == 429)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determines whether the attempt described by `ctx` should be retried.
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool;
}

/// The eligibility rule used when no predicate is supplied.
///
/// Only GET and HEAD requests are retried, on transport failures, timeouts,
/// 5xx statuses and 429.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRetry;

impl RetryPredicate for DefaultRetry {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        if !matches!(*ctx.method, Method::GET | Method::HEAD) {
            return false;
        }
        if let Some(kind) = ctx.error_kind() {
            return matches!(kind, ErrorKind::Network | ErrorKind::Timeout);
        }
        ctx.status().is_some_and(|status| {
            status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
        })
    }
}

/// Retry only on 5xx responses, for any method.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        ctx.status().is_some_and(|status| status.is_server_error())
    }
}

/// Retry only on timed-out attempts, for any method.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        ctx.error_kind() == Some(ErrorKind::Timeout)
    }
}

/// Retry only on transport failures, for any method.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnNetworkError;

impl RetryPredicate for RetryOnNetworkError {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        ctx.error_kind() == Some(ErrorKind::Network)
    }
}

/// A predicate backed by a closure. Build one with [`retry_fn`].
pub struct FnPredicate<F> {
    f: F,
}

/// Wraps a closure as a [`RetryPredicate`].
///
/// # Examples
///
/// ```
/// use safe_fetch::retry::retry_fn;
/// use safe_fetch::Backoff;
///
/// // Retry POST requests on 500 as well
/// let backoff = Backoff::new(2).retry_on(retry_fn(|ctx| {
///     ctx.status().is_some_and(|status| status.as_u16() == 500)
/// }));
/// ```
pub fn retry_fn<F>(f: F) -> FnPredicate<F>
where
    F: Fn(&RetryContext<'_>) -> bool + Send + Sync,
{
    FnPredicate { f }
}

impl<F> RetryPredicate for FnPredicate<F>
where
    F: Fn(&RetryContext<'_>) -> bool + Send + Sync,
{
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        (self.f)(ctx)
    }
}

/// Combine multiple retry predicates with OR logic.
///
/// Retries if ANY of the predicates return `true`.
///
/// # Examples
///
/// ```
/// use safe_fetch::retry::{OrPredicate, RetryOn5xx, RetryOnTimeout};
///
/// // Retry on 5xx errors OR timeouts
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOn5xx),
///     Box::new(RetryOnTimeout),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        self.predicates.iter().any(|p| p.should_retry(ctx))
    }
}

/// Combine multiple retry predicates with AND logic.
///
/// Retries only if ALL of the predicates return `true`.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        self.predicates.iter().all(|p| p.should_retry(ctx))
    }
}

/// Parses a `Retry-After` header given in integer seconds.
///
/// The HTTP-date form is not supported and yields `None`, as do negative
/// or malformed values.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    header.trim().parse::<u64>().ok().map(Duration::from_secs)
}
