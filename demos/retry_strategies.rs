//! Example demonstrating retry strategies and deadlines.
//!
//! This example shows how to:
//! - Disable retries
//! - Configure exponential backoff with a cap and jitter
//! - Replace the default GET/HEAD rule with a custom predicate
//! - Bound a call with per-attempt and total timeouts
//! - Abort a call from the outside
//!
//! Run with: `cargo run --example retry_strategies`

use safe_fetch::retry::{retry_fn, OrPredicate, RetryOn5xx, RetryOnTimeout};
use safe_fetch::{Backoff, Client, Error, RequestOptions, RetryStrategy};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing to see retry attempts
    tracing_subscriber::fmt()
        .with_env_filter("safe_fetch=info,retry_strategies=info")
        .init();

    println!("=== No Retry Strategy ===");
    let client_no_retry = Client::builder()
        .base_url("https://httpbin.org")?
        .retry_strategy(RetryStrategy::None)
        .build()?;

    let result = client_no_retry
        .get::<serde_json::Value>("/status/503", RequestOptions::new())
        .await;
    println!(
        "Failed immediately after {} attempt: {:?}",
        result.attempts(),
        result.error().map(|e| e.to_string())
    );
    println!();

    println!("=== Exponential Backoff Strategy ===");
    println!("Delays: 100ms, 200ms, 400ms (with jitter, capped at 1s)");
    let client_exponential = Client::builder()
        .base_url("https://httpbin.org")?
        .retry_strategy(
            Backoff::new(3)
                .base_delay(Duration::from_millis(100))
                .max_delay(Duration::from_secs(1))
                .jitter(true),
        )
        .timeout(Duration::from_secs(5))
        .build()?;

    let start = std::time::Instant::now();
    let result = client_exponential
        .get::<serde_json::Value>("/status/500", RequestOptions::new())
        .await;
    println!("Attempts: {}", result.attempts());
    println!("Total time: {:?}", start.elapsed());
    println!();

    println!("=== Custom Retry Predicate ===");
    println!("POST requests retried on 5xx or timeouts");
    let strategy = Backoff::new(2)
        .base_delay(Duration::from_millis(200))
        .retry_on(OrPredicate::new(vec![
            Box::new(RetryOn5xx),
            Box::new(RetryOnTimeout),
        ]));
    let result = client_exponential
        .post::<serde_json::Value, _>(
            "/status/502",
            &serde_json::json!({ "hello": "world" }),
            RequestOptions::new().retries(strategy),
        )
        .await;
    println!("Attempts: {}", result.attempts());
    println!();

    println!("=== Closure Predicate ===");
    println!("Retry only the first attempt, whatever went wrong");
    let strategy = Backoff::new(5).retry_on(retry_fn(|ctx| ctx.attempt == 0));
    let result = client_exponential
        .get::<serde_json::Value>("/status/404", RequestOptions::new().retries(strategy))
        .await;
    println!("Attempts: {}", result.attempts());
    println!();

    println!("=== Deadlines ===");
    let result = client_exponential
        .get::<serde_json::Value>(
            "/delay/3",
            RequestOptions::new()
                .timeout(Duration::from_secs(1))
                .total_timeout(Duration::from_millis(2500)),
        )
        .await;
    println!("{:?}", result.error().map(|e| e.to_string()));
    println!();

    println!("=== Cancellation ===");
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });
    let result = client_exponential
        .get::<serde_json::Value>("/delay/2", RequestOptions::new().cancel_token(token))
        .await;
    println!("{:?}", result.error().map(|e| e.to_string()));

    Ok(())
}
