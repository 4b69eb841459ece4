//! Common data models for completion requests and responses.

use bytes::Bytes;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::client::ClientError;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, non-empty list of messages. A system message may only appear
/// first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation(NonEmpty<Message>);

impl Conversation {
    /// Build a conversation, checking that it is non-empty and that no system
    /// message follows another message.
    pub fn new(messages: Vec<Message>) -> Result<Self, ClientError> {
        let messages = NonEmpty::from_vec(messages)
            .ok_or_else(|| ClientError::Config("conversation is empty".to_string()))?;

        if messages.tail.iter().any(|m| m.role == Role::System) {
            return Err(ClientError::Config(
                "system message must be the first message".to_string(),
            ));
        }

        Ok(Self(messages))
    }

    /// A single user message, optionally preceded by a system prompt.
    ///
    /// An empty system prompt is ignored.
    pub fn from_prompt(input: &str, system_prompt: Option<&str>) -> Self {
        let user = Message::user(input);
        match system_prompt.filter(|p| !p.is_empty()) {
            Some(prompt) => Self(NonEmpty {
                head: Message::system(prompt),
                tail: vec![user],
            }),
            None => Self(NonEmpty::new(user)),
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: a conversation holds at least one message.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn has_system_message(&self) -> bool {
        self.0.head.role == Role::System
    }

    /// Content of the last user message.
    pub fn last_user_content(&self) -> Option<&str> {
        self.0
            .tail
            .iter()
            .rev()
            .chain(std::iter::once(&self.0.head))
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Request body family, picked once from the engine name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `/chat/completions` with a message list.
    Chat,
    /// `/completions` with a flat prompt.
    Legacy,
}

const CHAT_ENGINE_PREFIXES: &[&str] = &["gpt-3.5", "gpt-4", "gpt-5", "chatgpt", "o1", "o3", "o4"];

impl RequestShape {
    pub fn for_engine(engine: &str) -> Self {
        let chat_family = CHAT_ENGINE_PREFIXES.iter().any(|p| engine.starts_with(p));
        if chat_family && !engine.contains("instruct") {
            RequestShape::Chat
        } else {
            RequestShape::Legacy
        }
    }

    /// Endpoint path relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            RequestShape::Chat => "chat/completions",
            RequestShape::Legacy => "completions",
        }
    }
}

/// Text produced by a completion. Empty when the model returned nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
}

impl CompletionResult {
    /// Normalize raw model output: missing text becomes an empty result and
    /// leading whitespace is stripped.
    pub fn from_text(text: Option<String>) -> Self {
        let text = text
            .map(|t| t.trim_start().to_string())
            .unwrap_or_default();
        Self { text }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// `None` for the "no content" outcome.
    pub fn into_text(self) -> Option<String> {
        Some(self.text).filter(|t| !t.is_empty())
    }
}

/// Audio payload for transcription.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub data: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioFile {
    pub fn new(data: impl Into<Bytes>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_for_engine() {
        assert_eq!(RequestShape::for_engine("gpt-3.5-turbo"), RequestShape::Chat);
        assert_eq!(RequestShape::for_engine("gpt-4o-mini"), RequestShape::Chat);
        assert_eq!(RequestShape::for_engine("o3-mini"), RequestShape::Chat);
        assert_eq!(
            RequestShape::for_engine("gpt-3.5-turbo-instruct"),
            RequestShape::Legacy
        );
        assert_eq!(RequestShape::for_engine("text-davinci-003"), RequestShape::Legacy);
        assert_eq!(RequestShape::for_engine("davinci-002"), RequestShape::Legacy);
    }

    #[test]
    fn test_conversation_rejects_late_system_message() {
        let err = Conversation::new(vec![Message::user("hi"), Message::system("be nice")]);
        assert!(matches!(err, Err(ClientError::Config(_))));
        assert!(matches!(Conversation::new(vec![]), Err(ClientError::Config(_))));

        let ok = Conversation::new(vec![Message::system("be nice"), Message::user("hi")]).unwrap();
        assert!(ok.has_system_message());
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn test_from_prompt() {
        let plain = Conversation::from_prompt("hello", None);
        assert_eq!(plain.len(), 1);
        assert!(!plain.is_empty());

        let empty_prompt = Conversation::from_prompt("hello", Some(""));
        assert_eq!(empty_prompt.len(), 1);

        let with_system = Conversation::from_prompt("hello", Some("You are terse."));
        let roles: Vec<Role> = with_system.messages().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(with_system.last_user_content(), Some("hello"));
    }

    #[test]
    fn test_completion_result_normalization() {
        let result = CompletionResult::from_text(Some("\n\n  Hello there  \n".to_string()));
        assert_eq!(result.text, "Hello there  \n");
        assert!(!result.is_empty());

        assert!(CompletionResult::from_text(None).is_empty());
        assert_eq!(CompletionResult::from_text(Some(String::new())).into_text(), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("x")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"x"}"#);
    }
}
