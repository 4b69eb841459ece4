//! Request and transport configuration.
//!
//! [`ClientDefaults`] is built once at start-up and never mutated. Each call
//! gets its own [`RequestOptions`], produced by layering the caller's
//! [`OptionOverrides`] on top of the defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::model::RequestShape;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_ENGINE: &str = "gpt-3.5-turbo";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Edge length of a generated square image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum ImageSize {
    Small,
    Medium,
    #[default]
    Large,
}

impl ImageSize {
    pub fn pixels(&self) -> u16 {
        match self {
            ImageSize::Small => 256,
            ImageSize::Medium => 512,
            ImageSize::Large => 1024,
        }
    }

    /// Wire format, e.g. `1024x1024`.
    pub fn as_dimensions(&self) -> String {
        format!("{0}x{0}", self.pixels())
    }
}

impl TryFrom<u16> for ImageSize {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            256 => Ok(ImageSize::Small),
            512 => Ok(ImageSize::Medium),
            1024 => Ok(ImageSize::Large),
            other => Err(format!("unsupported image size {other}, expected 256, 512 or 1024")),
        }
    }
}

impl From<ImageSize> for u16 {
    fn from(size: ImageSize) -> Self {
        size.pixels()
    }
}

/// Process-wide defaults. Constructed once and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDefaults {
    pub engine: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub image_size: ImageSize,
    pub base_url: String,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            engine: DEFAULT_ENGINE.to_string(),
            temperature: 1.0,
            max_tokens: 1000,
            image_size: ImageSize::Large,
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Caller-supplied settings. Every field is optional; set fields win over
/// [`ClientDefaults`].
///
/// Field names follow the host's settings keys, so a settings object can be
/// deserialized directly:
///
/// ```
/// use recipai::options::OptionOverrides;
///
/// let overrides: OptionOverrides = serde_json::from_str(
///     r#"{"apiKey": "sk-test", "completionEngine": "gpt-4o", "dalleImageSize": 512}"#,
/// ).unwrap();
/// assert_eq!(overrides.engine.as_deref(), Some("gpt-4o"));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionOverrides {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, rename = "completionEngine")]
    pub engine: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default, rename = "dalleImageSize")]
    pub image_size: Option<ImageSize>,
    #[serde(default, rename = "completionEndpoint")]
    pub base_url: Option<String>,
    #[serde(default, rename = "chatPrompt")]
    pub system_prompt: Option<String>,
}

/// Fully resolved options for one call.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub credential: SecretString,
    pub engine: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    pub system_prompt: Option<String>,
    pub image_size: ImageSize,
    /// Fires to abandon the call at its next suspension point.
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    /// Options built from the defaults alone.
    pub fn new(credential: impl Into<SecretString>, defaults: &ClientDefaults) -> Self {
        Self {
            credential: credential.into(),
            engine: defaults.engine.clone(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            base_url: defaults.base_url.clone(),
            system_prompt: None,
            image_size: defaults.image_size,
            cancellation: None,
        }
    }

    /// Layer caller overrides on top of the defaults.
    ///
    /// Blank strings in the overrides are treated as unset, which is how host
    /// settings usually represent "not configured".
    pub fn merged(defaults: &ClientDefaults, overrides: OptionOverrides) -> Self {
        fn non_blank(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        let mut options = Self::new(overrides.api_key.unwrap_or_default(), defaults);
        if let Some(engine) = non_blank(overrides.engine) {
            options.engine = engine;
        }
        if let Some(temperature) = overrides.temperature {
            options.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            options.max_tokens = max_tokens;
        }
        if let Some(image_size) = overrides.image_size {
            options.image_size = image_size;
        }
        if let Some(base_url) = non_blank(overrides.base_url) {
            options.base_url = base_url;
        }
        options.system_prompt = non_blank(overrides.system_prompt);
        options
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = size;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn shape(&self) -> RequestShape {
        RequestShape::for_engine(&self.engine)
    }

    /// `{base_url}/{path}` without doubled slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Check the options before any network call.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.credential.is_empty() {
            return Err(ClientError::Config("API key is required".to_string()));
        }
        if self.engine.trim().is_empty() {
            return Err(ClientError::Config("engine must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ClientError::Config(format!(
                "temperature {} is outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ClientError::Config("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// HTTP transport configuration shared by every call of a client.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Request timeout
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}
