//! Request and response types for chat completion calls.
//!
//! These mirror the OpenAI chat completion format. Response types are
//! lenient: fields some gateways omit default instead of failing.

use serde::{Deserialize, Serialize};

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The role of the message author ("system", "user").
    pub role: String,

    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a simple message with role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// A chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model identifier (e.g. "openai/gpt-3.5-turbo").
    pub model: String,

    /// The conversation messages.
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Create a minimal chat request with a model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// A chat completion response (OpenAI format).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,

    /// The list of completion choices.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// The model that generated the response.
    #[serde(default)]
    pub model: String,
}

impl ChatResponse {
    /// A response with a single assistant choice.
    pub fn from_content(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".into(),
                    content: Some(content.into()),
                },
                finish_reason: Some("stop".into()),
            }],
            model: model.into(),
        }
    }

    /// Content of the first choice, if it is present and non-empty.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
    }
}

/// A single completion choice within a response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Choice {
    /// The index of this choice in the list.
    #[serde(default)]
    pub index: i32,

    /// The assistant's response message.
    pub message: ResponseMessage,

    /// Why generation stopped (e.g. "stop", "length").
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a [`Choice`]. Content may be null.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub content: Option<String>,
}
