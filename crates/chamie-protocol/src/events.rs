//! Stream event frames.
//!
//! The chat endpoint streams its answer as SSE lines of the form
//! `data: {"content": "<fragment>"}` followed by a final `data: [DONE]`.
//! A mid-stream failure is delivered as a terminal `data: {"error": "..."}`
//! frame so the client never mistakes a broken stream for a complete answer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal sentinel payload closing a successful stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame of the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment to append to the in-flight message.
    Content(String),
    /// Terminal upstream failure; partial content already delivered stands.
    Error(String),
    /// Normal end of stream.
    Done,
}

/// Errors decoding a single `data:` payload.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame payload carries neither content nor error: {0}")]
    UnknownShape(String),
}

#[derive(Serialize, Deserialize)]
struct FramePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StreamEvent {
    /// Encode as a complete SSE frame, trailing blank line included.
    pub fn to_sse_frame(&self) -> String {
        match self {
            Self::Done => format!("data: {DONE_SENTINEL}\n\n"),
            Self::Content(content) => {
                let payload = FramePayload {
                    content: Some(content.clone()),
                    error: None,
                };
                // Serialization of a two-string-field struct cannot fail.
                format!(
                    "data: {}\n\n",
                    serde_json::to_string(&payload).unwrap_or_default()
                )
            }
            Self::Error(error) => {
                let payload = FramePayload {
                    content: None,
                    error: Some(error.clone()),
                };
                format!(
                    "data: {}\n\n",
                    serde_json::to_string(&payload).unwrap_or_default()
                )
            }
        }
    }

    /// The payload of a frame without SSE framing: JSON for content and
    /// error frames, the bare sentinel for `Done`.
    pub fn to_data_payload(&self) -> String {
        match self {
            Self::Done => DONE_SENTINEL.to_string(),
            other => {
                let frame = other.to_sse_frame();
                frame
                    .trim_end()
                    .strip_prefix("data: ")
                    .unwrap_or_default()
                    .to_string()
            }
        }
    }

    /// Decode the payload of one `data:` line.
    pub fn parse_data(payload: &str) -> Result<Self, FrameError> {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return Ok(Self::Done);
        }
        let frame: FramePayload = serde_json::from_str(payload)?;
        if let Some(content) = frame.content {
            Ok(Self::Content(content))
        } else if let Some(error) = frame.error {
            Ok(Self::Error(error))
        } else {
            Err(FrameError::UnknownShape(payload.to_string()))
        }
    }
}
