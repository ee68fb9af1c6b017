//! Basic example demonstrating simple GET and POST calls.
//!
//! This example shows how to:
//! - Create a client with a base URL, default headers and a deadline
//! - Make GET requests and inspect the `SafeResult`
//! - Make POST requests with a JSON body
//! - Validate a response into a narrower type
//! - Observe calls with an interceptor
//!
//! Run with: `cargo run --example basic_call`

use async_trait::async_trait;
use safe_fetch::{
    BoxError, Client, Error, Interceptor, RawResponse, Request, RequestOptions, SafeResult,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

/// Prints every request and response status.
struct PrintCalls;

#[async_trait]
impl Interceptor for PrintCalls {
    async fn on_request(&self, request: &Request) -> Result<(), BoxError> {
        println!("--> {} {}", request.method, request.url);
        Ok(())
    }

    async fn on_response(&self, response: &RawResponse) -> Result<(), BoxError> {
        println!("<-- {} {}", response.status.as_u16(), response.status_text);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("safe_fetch=debug,basic_call=info")
        .init();

    // Create a client for the JSONPlaceholder API
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("Accept", "application/json")?
        .total_timeout(Duration::from_secs(10))
        .interceptor(PrintCalls)
        .build()?;

    println!("=== GET Request Example ===");
    match client.get::<Post>("/posts/1", RequestOptions::new()).await {
        SafeResult::Success(response) => {
            println!("Post ID: {}", response.data.id);
            println!("Title: {}", response.data.title);
            println!("Request latency: {:?}", response.latency);
            println!("Status code: {}", response.status());
        }
        SafeResult::Failure(failure) => println!("{}: {}", failure.kind(), failure.error),
    }
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let created = client
        .post::<Post, _>("/posts", &new_post, RequestOptions::new())
        .await;
    if let SafeResult::Success(response) = &created {
        println!("Created post ID: {}", response.data.id);
        println!("Content-Type: {:?}", response.header("content-type"));
        println!("Was retried: {}", response.was_retried());
    }
    println!();

    println!("=== Validation Example ===");
    let options = RequestOptions::<Vec<String>>::new()
        .query("userId", 1)
        .validate_with(|body| {
            let posts = body.as_json().and_then(|v| v.as_array()).ok_or("expected a list")?;
            posts
                .iter()
                .map(|post| {
                    post["title"]
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "post without a title".into())
                })
                .collect()
        });

    match client.get("/posts", options).await {
        SafeResult::Success(titles) => println!("User 1 wrote {} posts", titles.data.len()),
        SafeResult::Failure(failure) => println!("Validation failed: {:?}", failure.error.cause()),
    }
    println!();

    println!("=== HTTP Error Example ===");
    let missing = client
        .get::<Post>("/posts/999999", RequestOptions::new())
        .await;
    if let Some(error) = missing.error() {
        println!("{} (status {:?})", error, error.status());
    }

    Ok(())
}
