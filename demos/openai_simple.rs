//! Buffered completions against an OpenAI-compatible endpoint.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example openai_simple
//! ```

use recipai::client::Client;
use recipai::model::{Conversation, Message};
use recipai::options::{ClientDefaults, RequestOptions, TransportOptions};
use recipai::providers::OpenAiClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key =
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");

    let client = OpenAiClient::new(TransportOptions::new())?;
    let options = RequestOptions::new(api_key, &ClientDefaults::default())
        .with_temperature(0.7)
        .with_max_tokens(100)
        .with_system_prompt("Answer as briefly as possible.");

    println!("Sending request to OpenAI...");
    match client
        .complete_prompt("What is the capital of France?", &options)
        .await
    {
        Ok(result) => println!("\n=== Response ===\n{}", result.text),
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    }

    println!("\n\n=== Multi-turn conversation ===");
    let conversation = Conversation::new(vec![
        Message::user("My name is Alice."),
        Message::assistant("Hello Alice! Nice to meet you."),
        Message::user("What's my name?"),
    ])?;

    match client.complete(&conversation, &options).await {
        Ok(result) => println!("\n=== Response ===\n{}", result.text),
        Err(e) => eprintln!("Error: {}", e),
    }

    Ok(())
}
