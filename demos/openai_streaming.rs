//! Streaming completions, via callbacks and as a `Stream`.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example openai_streaming
//! ```

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use recipai::client::StreamingClient;
use recipai::model::Conversation;
use recipai::options::{ClientDefaults, RequestOptions, TransportOptions};
use recipai::providers::OpenAiClient;
use recipai::stream::StreamEvent;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key =
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");

    let client = OpenAiClient::new(TransportOptions::new().with_timeout(Duration::from_secs(60)))?;
    let options = RequestOptions::new(api_key, &ClientDefaults::default()).with_temperature(0.9);

    println!("=== Callbacks ===");
    let result = client
        .complete_prompt_streaming(
            "Write a haiku about bread dough.",
            &options,
            |fragment| {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
            },
            || println!("\n[done]"),
        )
        .await?;
    println!("Aggregate length: {} chars", result.text.chars().count());

    // Abandon the second stream after two seconds.
    println!("\n=== Stream with cancellation ===");
    let token = CancellationToken::new();
    let options = options.with_cancellation(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        token.cancel();
    });

    let conversation = Conversation::from_prompt("Count slowly from 1 to 200.", None);
    let mut stream = client.complete_stream(&conversation, &options).await?;
    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::Content(fragment)) => {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
            }
            Ok(StreamEvent::Done) => break,
            Err(e) => {
                eprintln!("\nStream ended: {}", e);
                break;
            }
        }
    }

    Ok(())
}
