//! Wire types for the OpenAI-compatible `/chat/completions` contract.
//!
//! Messages carry either a scalar string `content` or an array of typed
//! content parts (text + image data URIs). Some upstream deployments accept
//! only one of the two encodings — `CompletionRequest::with_parts_encoding`
//! produces the array form for the 400-retry path.

use serde::{Deserialize, Serialize};

/// Message role. Ordering of messages is preserved end to end; the first
/// message, when `system`, sets the task framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A `data:<mime>;base64,<payload>` image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of a content-parts array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Message content: scalar string or content-parts array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Scalar text of this content, when it is scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(t) => Some(t),
            MessageContent::Parts(_) => None,
        }
    }

    /// Re-encode as a content-parts array. Scalar strings become a
    /// one-element text part; part arrays are returned unchanged.
    pub fn into_parts(self) -> MessageContent {
        match self {
            MessageContent::Text(text) => {
                MessageContent::Parts(vec![ContentPart::Text { text }])
            }
            parts @ MessageContent::Parts(_) => parts,
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// User message carrying a content-parts array (multimodal input).
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Immutable completion request. Dispatched as-is; the dispatcher only ever
/// substitutes the model id when escalating to the fallback tier.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens,
            stream: None,
        }
    }

    /// Same request aimed at a different model.
    pub fn with_model(&self, model: &str) -> Self {
        let mut req = self.clone();
        req.model = model.to_string();
        req
    }

    /// Same request with every scalar message content re-encoded as a
    /// one-element content-parts array (the alternate wire encoding some
    /// deployments require — used by the HTTP transport's 400 retry).
    pub fn with_parts_encoding(&self) -> Self {
        let mut req = self.clone();
        req.messages = req
            .messages
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.into_parts(),
            })
            .collect();
        req
    }
}

/// Successful dispatch result: the raw reply text and the model that
/// actually produced it (primary or fallback).
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub text: String,
    pub model_used: String,
}
