//! Image generation and audio transcription endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::OpenAiClient;
use crate::client::{ClientError, MediaClient};
use crate::http::{check_status, RequestBuilderExt, ResponseExt};
use crate::model::AudioFile;
use crate::options::RequestOptions;
use crate::retry;

const TRANSCRIPTION_MODEL: &str = "whisper-1";

impl OpenAiClient {
    async fn request_image(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<Option<String>, ClientError> {
        let body = ImageRequest {
            prompt,
            n: 1,
            size: options.image_size.as_dimensions(),
        };
        let req = self.post("images/generations", options)?.json_logged(&body);
        let response = check_status(req.send().await?).await?;

        let images: ImageResponse = response.json_logged().await?;
        Ok(images.data.into_iter().next().and_then(|image| image.url))
    }

    async fn request_transcription(
        &self,
        audio: &AudioFile,
        options: &RequestOptions,
    ) -> Result<String, ClientError> {
        // Form is consumed by send, so each attempt builds its own.
        let file = Part::stream_with_length(audio.data.clone(), audio.data.len() as u64)
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", file);

        let req = self.post("audio/transcriptions", options)?.multipart(form);
        let response = check_status(req.send().await?).await?;

        let transcription: TranscriptionResponse = response.json_logged().await?;
        Ok(transcription.text)
    }
}

#[async_trait]
impl MediaClient for OpenAiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<Option<String>, ClientError> {
        options.validate()?;
        debug!(size = %options.image_size.as_dimensions(), "generating image");
        retry::execute(&self.backoff, options.cancellation.as_ref(), || {
            self.request_image(prompt, options)
        })
        .await
    }

    async fn transcribe(
        &self,
        audio: &AudioFile,
        options: &RequestOptions,
    ) -> Result<String, ClientError> {
        options.validate()?;
        debug!(file = %audio.file_name, bytes = audio.data.len(), "transcribing audio");
        retry::execute(&self.backoff, options.cancellation.as_ref(), || {
            self.request_transcription(audio, options)
        })
        .await
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}
