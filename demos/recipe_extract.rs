//! Extract a structured recipe from a page address or pasted text.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example recipe_extract -- https://example.com/some-recipe
//! ```

use recipai::options::{ClientDefaults, RequestOptions, TransportOptions};
use recipai::providers::OpenAiClient;
use recipai::recipe::RecipeExtractor;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key =
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");
    let input = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    if input.trim().is_empty() {
        eprintln!("usage: recipe_extract <url or recipe text>");
        std::process::exit(2);
    }

    let extractor = RecipeExtractor::new(OpenAiClient::new(TransportOptions::new())?);
    let options = RequestOptions::new(api_key, &ClientDefaults::default());

    let recipe = extractor.extract_recipe(&input, &options).await?;
    println!("{}", serde_json::to_string_pretty(&recipe)?);
    Ok(())
}
