//! # llama-server-client - typed client for the llama.cpp HTTP server
//!
//! An async client for the native and OpenAI-compatible endpoints of
//! `llama-server`.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Typed request and response models for every endpoint
//! - Streaming support via Server-Sent Events
//! - Server error envelopes surfaced as [`ServerError`]
//!
//! ## Architecture
//!
//! - **[`TransportOptions`]**: base URL, timeout, API key and headers, built
//!   by hand or read from `LLAMA_SERVER_URL`, `LLAMA_API_KEY` and
//!   `LLAMA_TIMEOUT_SECS`
//! - **[`LlamaClient`]**: one method per endpoint, sharing a connection pool
//! - **[`api`]**: request and response shapes, one module per endpoint family
//! - **[`sse`]**: incremental decoding of `data:` events up to `[DONE]`
//!
//! Requests are immutable values. The streaming and non-streaming form of an
//! operation take the same request and set `stream` on the wire themselves.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use llama_server_client::api::openai::ChatCompletionRequest;
//! use llama_server_client::model::Message;
//! use llama_server_client::{LlamaClient, TransportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LlamaClient::new(TransportOptions::new("http://localhost:8080"))?;
//!
//!     let request = ChatCompletionRequest::new(vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Write a haiku about the sea."),
//!     ])
//!     .with_temperature(0.7);
//!
//!     let response = client.chat_completion(&request).await?;
//!     println!("{:?}", response.first_choice().message.text());
//!
//!     let mut stream = client.chat_completion_stream(&request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         if let Some(text) = chunk?.delta_content() {
//!             print!("{text}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;

// Re-exports for convenience
pub use client::{ClientError, EventStream, LlamaClient, ServerError};
pub use model::{Health, Message, Role};
pub use options::TransportOptions;
