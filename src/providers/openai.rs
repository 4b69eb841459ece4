//! OpenAI-compatible completion client.
//!
//! Speaks both the Chat Completions API (`/chat/completions`) and the legacy
//! text Completions API (`/completions`); the family is chosen from the
//! engine name via [`RequestShape::for_engine`].
//! See: <https://platform.openai.com/docs/api-reference/chat>

mod media;

use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{Client, ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, check_status, RequestBuilderExt, ResponseExt};
use crate::model::{CompletionResult, Conversation, RequestShape, Role};
use crate::options::{RequestOptions, TransportOptions};
use crate::retry::Backoff;
use crate::sse::{self, Frame};
use crate::stream::{FragmentStream, StreamEvent};

/// Client for OpenAI and API-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    transport_options: TransportOptions,
    backoff: Backoff,
}

impl OpenAiClient {
    /// Create a client with the default retry schedule.
    pub fn new(transport_options: TransportOptions) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&transport_options)?,
            transport_options,
            backoff: Backoff::default(),
        })
    }

    /// Replace the retry schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    /// Authenticated POST to `{base_url}/{path}`.
    fn post(&self, path: &str, options: &RequestOptions) -> Result<reqwest::RequestBuilder, ClientError> {
        if options.credential.is_empty() {
            return Err(ClientError::Config("API key is required".to_string()));
        }

        let req = self.http.post(options.endpoint(path)).header(
            AUTHORIZATION,
            format!("Bearer {}", options.credential.expose_secret()),
        );
        Ok(add_extra_headers(req, &self.transport_options.extra_headers))
    }

    fn completion_request(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let shape = options.shape();
        let body = CompletionRequest::new(conversation, options, shape, stream)?;
        debug!(engine = %options.engine, ?shape, stream, "sending completion request");

        let mut req = self.post(shape.path(), options)?.header(CONTENT_TYPE, "application/json");
        if stream {
            req = req.header(ACCEPT, "text/event-stream");
        }
        Ok(req.json_logged(&body))
    }
}

#[async_trait]
impl Client for OpenAiClient {
    async fn request(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError> {
        let req = self.completion_request(conversation, options, false)?;
        let response = check_status(req.send().await?).await?;

        let completion: CompletionResponse = response.json_logged().await?;
        let text = completion.into_text(options.shape());
        if text.is_none() {
            debug!(engine = %options.engine, "completion returned no content");
        }
        Ok(CompletionResult::from_text(text))
    }

    fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

#[async_trait]
impl StreamingClient for OpenAiClient {
    async fn open_stream(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<FragmentStream, ClientError> {
        let req = self.completion_request(conversation, options, true)?;
        let response = check_status(req.send().await?).await?;
        Ok(events_from_bytes(response.bytes_stream(), options.shape()))
    }
}

/// Decode an SSE byte stream into completion events.
///
/// Payloads that are not valid JSON are skipped, as are records carrying no
/// new text (e.g. the initial role-only delta).
pub fn events_from_bytes<S, B, E>(byte_stream: S, shape: RequestShape) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    Box::pin(sse::frames(byte_stream).filter_map(move |frame| {
        future::ready(match frame {
            Ok(Frame::Data(payload)) => {
                decode_fragment(&payload, shape).map(|fragment| Ok(StreamEvent::Content(fragment)))
            }
            Ok(Frame::Done) => Some(Ok(StreamEvent::Done)),
            Err(e) => Some(Err(e)),
        })
    }))
}

/// Extract the text increment of one stream record.
fn decode_fragment(payload: &str, shape: RequestShape) -> Option<String> {
    let chunk: StreamChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, payload, "skipping malformed stream record");
            return None;
        }
    };

    let choice = chunk.choices.into_iter().next()?;
    let fragment = match shape {
        RequestShape::Chat => choice.delta.and_then(|d| d.content),
        RequestShape::Legacy => choice.text,
    };
    fragment.filter(|f| !f.is_empty())
}

// --- Request Types ---

/// Fixed sampling parameters. Not configurable.
const TOP_P: f32 = 1.0;
const FREQUENCY_PENALTY: f32 = 0.0;
const PRESENCE_PENALTY: f32 = 0.0;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    #[serde(flatten)]
    input: RequestInput<'a>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestInput<'a> {
    Chat { messages: Vec<ChatMessage<'a>> },
    Legacy { prompt: &'a str },
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> CompletionRequest<'a> {
    fn new(
        conversation: &'a Conversation,
        options: &'a RequestOptions,
        shape: RequestShape,
        stream: bool,
    ) -> Result<Self, ClientError> {
        let input = match shape {
            RequestShape::Chat => {
                let mut messages = Vec::with_capacity(conversation.len() + 1);
                if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.is_empty()) {
                    if !conversation.has_system_message() {
                        messages.push(ChatMessage {
                            role: Role::System,
                            content: system,
                        });
                    }
                }
                messages.extend(conversation.messages().map(|m| ChatMessage {
                    role: m.role,
                    content: &m.content,
                }));
                RequestInput::Chat { messages }
            }
            RequestShape::Legacy => RequestInput::Legacy {
                prompt: conversation.last_user_content().ok_or_else(|| {
                    ClientError::Config("legacy completion requires a user message".to_string())
                })?,
            },
        };

        Ok(CompletionRequest {
            model: &options.engine,
            input,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: TOP_P,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
            stream,
        })
    }
}

// --- Response Types ---

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self, shape: RequestShape) -> Option<String> {
        let choice = self.choices.into_iter().next()?;
        let text = match shape {
            RequestShape::Chat => choice.message.and_then(|m| m.content),
            RequestShape::Legacy => choice.text,
        };
        text.filter(|t| !t.is_empty())
    }
}

// --- Stream Types ---

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
