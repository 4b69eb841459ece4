//! Structured recipe extraction from a page address or pasted text.
//!
//! When the input is an `http(s)` address the page is fetched and reduced to
//! its visible text first; anything else is sent to the model verbatim.

use serde_json::Value;
use tracing::{debug, info};

use crate::client::{Client, ClientError};
use crate::html::{self, DEFAULT_MAX_LENGTH};
use crate::model::{Conversation, Message};
use crate::options::RequestOptions;

/// Instruction sent ahead of every recipe.
pub const RECIPE_SYSTEM_PROMPT: &str = "You are a helpful assistant. Extract the recipe from the content provided. If nutrition information is not provided, calculate based on ingredients. Use metric units. If the content is in English, translate to German. Return the extracted recipe as a JSON object with the following fields: title, description, list of ingredients (combine quantity, unit and ingredient as one list item), individual ingredients (only list ingredients without quantity and unit), instructions (one list item per step), prep_time, cook_time, total_time, servings, nutrition_information, cuisine, category, tags. Here is the recipe:";

const RECIPE_TEMPERATURE: f32 = 0.5;
const RECIPE_MAX_TOKENS: u32 = 3000;

/// Turns recipe pages into JSON objects via a completion [`Client`].
pub struct RecipeExtractor<C> {
    client: C,
    http: reqwest::Client,
    content_limit: usize,
}

impl<C: Client> RecipeExtractor<C> {
    pub fn new(client: C) -> Self {
        Self::with_http(client, reqwest::Client::new())
    }

    /// Use `http` for page fetches instead of a fresh client.
    pub fn with_http(client: C, http: reqwest::Client) -> Self {
        Self {
            client,
            http,
            content_limit: DEFAULT_MAX_LENGTH,
        }
    }

    /// Cap on characters of page text forwarded to the model.
    pub fn with_content_limit(mut self, limit: usize) -> Self {
        self.content_limit = limit;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Extract a recipe from `input`.
    ///
    /// The engine and credential come from `options`; sampling is pinned for
    /// stable JSON output. An empty model reply yields an empty object.
    pub async fn extract_recipe(
        &self,
        input: &str,
        options: &RequestOptions,
    ) -> Result<Value, ClientError> {
        options.validate()?;
        let content = match page_url(input) {
            Some(url) => {
                info!(%url, "fetching recipe page");
                self.fetch_page(url).await?
            }
            None => input.to_string(),
        };

        let conversation = Conversation::new(vec![
            Message::system(RECIPE_SYSTEM_PROMPT),
            Message::user(content),
        ])?;
        let options = options
            .clone()
            .with_temperature(RECIPE_TEMPERATURE)
            .with_max_tokens(RECIPE_MAX_TOKENS);

        let result = self.client.complete(&conversation, &options).await?;
        if result.is_empty() {
            debug!("model returned no recipe");
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&result.text)?)
    }

    async fn fetch_page(&self, url: reqwest::Url) -> Result<String, ClientError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Fetch(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Fetch(format!("{url}: {e}")))?;
        let extracted = html::extract(&body, self.content_limit);
        debug!(
            chars = extracted.content.chars().count(),
            truncated = extracted.truncated,
            "extracted page text"
        );
        Ok(extracted.content)
    }
}

/// Parse `input` as a page address if it looks like one.
fn page_url(input: &str) -> Option<reqwest::Url> {
    let trimmed = input.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return None;
    }
    reqwest::Url::parse(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionResult, Role};
    use crate::options::ClientDefaults;
    use crate::retry::{Backoff, ErrorKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeClient {
        reply: Option<String>,
        backoff: Backoff,
        seen: Mutex<Vec<(Conversation, f32, u32)>>,
    }

    impl FakeClient {
        fn replying(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                backoff: Backoff::immediate(1),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Client for FakeClient {
        async fn request(
            &self,
            conversation: &Conversation,
            options: &RequestOptions,
        ) -> Result<CompletionResult, ClientError> {
            self.seen.lock().unwrap().push((
                conversation.clone(),
                options.temperature,
                options.max_tokens,
            ));
            Ok(CompletionResult::from_text(self.reply.clone()))
        }

        fn backoff(&self) -> &Backoff {
            &self.backoff
        }
    }

    fn options() -> RequestOptions {
        RequestOptions::new("sk-test", &ClientDefaults::default())
    }

    #[test]
    fn test_page_url_detection() {
        assert!(page_url("https://example.com/pancakes").is_some());
        assert!(page_url("  http://example.com ").is_some());
        assert!(page_url("2 eggs, 1 cup milk").is_none());
        assert!(page_url("httpbin is a site").is_none());
        assert!(page_url("ftp://example.com").is_none());
    }

    #[tokio::test]
    async fn test_pasted_text_is_sent_verbatim() {
        let extractor = RecipeExtractor::new(FakeClient::replying(Some(r#"{"title":"Pfannkuchen"}"#)));
        let recipe = extractor
            .extract_recipe("Pancakes: 2 eggs, 1 cup milk", &options())
            .await
            .unwrap();
        assert_eq!(recipe["title"], "Pfannkuchen");

        let seen = extractor.client().seen.lock().unwrap();
        let (conversation, temperature, max_tokens) = &seen[0];
        let messages: Vec<_> = conversation.messages().collect();
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, RECIPE_SYSTEM_PROMPT);
        assert_eq!(messages[1].content, "Pancakes: 2 eggs, 1 cup milk");
        assert_eq!(*temperature, RECIPE_TEMPERATURE);
        assert_eq!(*max_tokens, RECIPE_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_empty_reply_is_empty_object() {
        let extractor = RecipeExtractor::new(FakeClient::replying(None));
        let recipe = extractor.extract_recipe("anything", &options()).await.unwrap();
        assert_eq!(recipe, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_parse_failure() {
        let extractor = RecipeExtractor::new(FakeClient::replying(Some("not json")));
        let err = extractor.extract_recipe("anything", &options()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }
}
