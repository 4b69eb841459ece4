//! # recipai - OpenAI-compatible completion client with recipe extraction
//!
//! An async client for chat and legacy completion endpoints, image
//! generation and audio transcription, plus a recipe extractor that turns a
//! web page or pasted text into a structured JSON recipe.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Chat or legacy request shape picked from the engine name
//! - Streaming via Server-Sent Events, with callbacks or as a `Stream`
//! - Exponential backoff on network failures, rate limits and server errors
//! - Cooperative cancellation through `CancellationToken`
//!
//! ## Example
//! ```no_run
//! use recipai::client::Client;
//! use recipai::options::{ClientDefaults, RequestOptions, TransportOptions};
//! use recipai::providers::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAiClient::new(TransportOptions::new())?;
//!     let options = RequestOptions::new("your-api-key", &ClientDefaults::default())
//!         .with_system_prompt("You are a concise assistant.");
//!
//!     let result = client.complete_prompt("Hello!", &options).await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod html;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod recipe;
pub mod retry;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{Client, ClientError, MediaClient, StreamingClient};
pub use model::{AudioFile, CompletionResult, Conversation, Message, Role};
pub use options::{ClientDefaults, OptionOverrides, RequestOptions, TransportOptions};
pub use recipe::RecipeExtractor;
pub use stream::StreamEvent;
