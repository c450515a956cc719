//! Client error types.

use thiserror::Error;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before or during streaming.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the request with a structured error body.
    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A generation is already in flight for this conversation.
    #[error("a generation is already in flight")]
    InFlight,

    /// Submit called with nothing to say.
    #[error("message is empty")]
    EmptyMessage,

    /// Continue requested for a message the heuristic never flagged.
    #[error("message {0} is not flagged as truncated")]
    NotFlagged(String),

    /// Continue requested for an unknown message id.
    #[error("no such message: {0}")]
    UnknownMessage(String),

    /// Uploaded file is not a plain-text document.
    #[error("unsupported file (only .txt is accepted): {0}")]
    UnsupportedFile(String),
}
