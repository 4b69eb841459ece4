//! Core client traits and error types.

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;

use crate::model::{AudioFile, CompletionResult, Conversation};
use crate::options::RequestOptions;
use crate::retry::{self, AttemptOutcome, Backoff, ErrorKind, Retryable};
use crate::stream::{FragmentStream, StreamEvent};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("Provider error (HTTP {status}): {message}")]
    Provider {
        status: u16,
        /// Provider error type, e.g. `insufficient_quota`.
        error_type: Option<String>,
        /// Message exactly as the provider sent it.
        message: String,
    },

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Category of this error in the retry taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Http(e) if e.is_decode() => ErrorKind::ParseFailure,
            ClientError::Http(e) if e.is_builder() => ErrorKind::ClientError,
            ClientError::Http(_) => ErrorKind::NetworkFailure,
            ClientError::Parse(_) => ErrorKind::ParseFailure,
            ClientError::Provider {
                status: 429,
                error_type,
                ..
            } => {
                if error_type.as_deref() == Some("insufficient_quota") {
                    ErrorKind::QuotaExceeded
                } else {
                    ErrorKind::RateLimited
                }
            }
            ClientError::Provider { status, .. } if *status >= 500 => ErrorKind::ServerError,
            ClientError::Provider { .. } | ClientError::Config(_) => ErrorKind::ClientError,
            ClientError::Fetch(_) => ErrorKind::FetchFailure,
            ClientError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Provider { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl Retryable for ClientError {
    fn outcome(&self) -> AttemptOutcome {
        AttemptOutcome {
            http_status: self.status(),
            kind: self.kind(),
        }
    }

    fn cancelled() -> Self {
        ClientError::Cancelled
    }
}

/// Buffered completions against a chat or legacy completion endpoint.
///
/// Implementors provide a single attempt in [`Client::request`]; the provided
/// methods add option validation and the backoff loop.
#[async_trait]
pub trait Client: Send + Sync {
    /// Send one request without retrying.
    async fn request(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError>;

    /// Retry schedule used by the provided methods.
    fn backoff(&self) -> &Backoff;

    /// Complete a conversation, retrying transient failures.
    async fn complete(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError> {
        options.validate()?;
        retry::execute(self.backoff(), options.cancellation.as_ref(), || {
            self.request(conversation, options)
        })
        .await
    }

    /// Complete a single prompt, preceded by the configured system prompt.
    async fn complete_prompt(
        &self,
        input: &str,
        options: &RequestOptions,
    ) -> Result<CompletionResult, ClientError> {
        let conversation = Conversation::from_prompt(input, options.system_prompt.as_deref());
        self.complete(&conversation, options).await
    }
}

/// Incremental completions delivered as they are generated.
#[async_trait]
pub trait StreamingClient: Client {
    /// Open a stream with a single attempt.
    async fn open_stream(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<FragmentStream, ClientError>;

    /// Open a stream, retrying failures that happen before the first event.
    ///
    /// Errors after the stream started are yielded by the stream itself.
    async fn complete_stream(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<FragmentStream, ClientError> {
        options.validate()?;
        let stream = retry::execute(self.backoff(), options.cancellation.as_ref(), || {
            self.open_stream(conversation, options)
        })
        .await?;

        Ok(match &options.cancellation {
            Some(token) => crate::stream::cancellable(stream, token.clone()),
            None => stream,
        })
    }

    /// Stream a completion into callbacks and return the aggregate text.
    ///
    /// The connect-and-read loop is retried as a whole. Fragments already
    /// handed to `on_fragment` before a failed attempt are not retracted, so a
    /// retried stream may deliver the same text again. The returned text only
    /// contains the successful attempt.
    async fn complete_streaming<F, D>(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
        on_fragment: F,
        on_done: D,
    ) -> Result<CompletionResult, ClientError>
    where
        F: Fn(&str) + Send + Sync,
        D: FnOnce() + Send,
    {
        options.validate()?;
        let on_fragment = &on_fragment;

        let text = retry::execute(self.backoff(), options.cancellation.as_ref(), || async move {
            let mut stream = self.open_stream(conversation, options).await?;
            let mut text = String::new();
            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::Content(fragment) => {
                        on_fragment(&fragment);
                        text.push_str(&fragment);
                    }
                    StreamEvent::Done => break,
                }
            }
            Ok::<_, ClientError>(text)
        })
        .await?;

        on_done();
        Ok(CompletionResult::from_text(Some(text)))
    }

    /// Streaming counterpart of [`Client::complete_prompt`].
    async fn complete_prompt_streaming<F, D>(
        &self,
        input: &str,
        options: &RequestOptions,
        on_fragment: F,
        on_done: D,
    ) -> Result<CompletionResult, ClientError>
    where
        F: Fn(&str) + Send + Sync,
        D: FnOnce() + Send,
    {
        let conversation = Conversation::from_prompt(input, options.system_prompt.as_deref());
        self.complete_streaming(&conversation, options, on_fragment, on_done)
            .await
    }
}

/// Image generation and audio transcription.
#[async_trait]
pub trait MediaClient: Send + Sync {
    /// Generate one image and return the locator of the first result.
    async fn generate_image(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<Option<String>, ClientError>;

    /// Transcribe an audio file to text.
    async fn transcribe(
        &self,
        audio: &AudioFile,
        options: &RequestOptions,
    ) -> Result<String, ClientError>;
}
