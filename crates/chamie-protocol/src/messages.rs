//! Chat request and message types.
//!
//! The chat endpoint accepts two request shapes: the conversation form used
//! by the full chat UI (ordered history plus optional file context) and a
//! single-turn form used by minimal callers. [`ChatRequest::into_parts`]
//! normalizes both into one ordered message list.

use serde::{Deserialize, Serialize};

/// Message role on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Gemini speaks `user`/`model` instead of `user`/`assistant`.
    pub fn as_gemini(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One conversation turn as sent to the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for `POST /api/chat`.
///
/// Untagged: a body carrying `messages` deserializes as the conversation
/// form, a body carrying `message` as the single-turn form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Conversation {
        messages: Vec<ChatMessage>,
        #[serde(
            rename = "fileContext",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        file_context: Option<String>,
        #[serde(rename = "requireFileContext", default)]
        require_file_context: bool,
    },
    SingleTurn {
        message: String,
        #[serde(
            rename = "fileContext",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        file_context: Option<String>,
        #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
}

/// Normalized request contents, independent of the wire shape.
#[derive(Debug, Clone)]
pub struct ChatRequestParts {
    pub messages: Vec<ChatMessage>,
    pub file_context: Option<String>,
    pub require_file_context: bool,
}

impl ChatRequest {
    /// Normalize either wire shape into an ordered message list.
    ///
    /// Single-turn requests become a one-element history. A single-turn
    /// request that supplies file context requires it implicitly, matching
    /// the grounded deployment mode.
    pub fn into_parts(self) -> ChatRequestParts {
        match self {
            Self::Conversation {
                messages,
                file_context,
                require_file_context,
            } => ChatRequestParts {
                messages,
                file_context,
                require_file_context,
            },
            Self::SingleTurn {
                message,
                file_context,
                file_name: _,
            } => {
                let require_file_context = file_context.is_some();
                ChatRequestParts {
                    messages: vec![ChatMessage::user(message)],
                    file_context,
                    require_file_context,
                }
            }
        }
    }
}

/// JSON error body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
