//! HTTP client utilities shared by the providers.
//!
//! Client construction from [`TransportOptions`], header helpers, traced
//! request/response bodies and conversion of error responses into
//! [`ClientError::Provider`].

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("invalid proxy {proxy_url}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

pub trait RequestBuilderExt {
    /// Like [`RequestBuilder::json`], tracing the serialized body first.
    fn json_logged<T: Serialize + ?Sized>(self, body: &T) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: Serialize + ?Sized>(self, body: &T) -> Self {
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(text) = serde_json::to_string(body) {
                trace!(body = %text, "request body");
            }
        }
        self.json(body)
    }
}

#[async_trait::async_trait]
pub trait ResponseExt {
    /// Read the body as text, tracing it.
    async fn text_logged(self) -> Result<String, ClientError>;

    /// Read and deserialize the body as JSON, tracing the raw text.
    async fn json_logged<T: DeserializeOwned + Send>(self) -> Result<T, ClientError>;
}

#[async_trait::async_trait]
impl ResponseExt for Response {
    async fn text_logged(self) -> Result<String, ClientError> {
        let status = self.status();
        let text = self.text().await?;
        trace!(%status, body = %text, "response body");
        Ok(text)
    }

    async fn json_logged<T: DeserializeOwned + Send>(self) -> Result<T, ClientError> {
        let text = self.text_logged().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

/// Turn a non-success response into a provider error.
///
/// The provider's own message is kept verbatim when the body carries the
/// usual `{"error": {"type", "message"}}` envelope; otherwise the raw body, or
/// the status text when the body is empty, is used.
pub fn error_from_response(status: StatusCode, body: &str) -> ClientError {
    let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.error_type, envelope.error.message),
        Err(_) => (None, None),
    };

    let message = message
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());

    ClientError::Provider {
        status: status.as_u16(),
        error_type,
        message,
    }
}

/// Pass successful responses through, convert the rest with
/// [`error_from_response`].
pub async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.text_logged().await {
        Ok(body) => body,
        Err(e) => {
            debug!(%status, error = %e, "failed to read error body");
            String::new()
        }
    };
    Err(error_from_response(status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions::new().with_timeout(Duration::from_secs(30));

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options =
            TransportOptions::new().with_proxy("http://proxy.example.com:8080".to_string());

        let client = build_http_client(&transport_options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_error_from_openai_envelope() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = error_from_response(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        match err {
            ClientError::Provider { message, .. } => {
                assert_eq!(message, "You exceeded your current quota")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_from_plain_body() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.to_string().contains("upstream unavailable"));

        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().contains("Service Unavailable"));
    }
}
