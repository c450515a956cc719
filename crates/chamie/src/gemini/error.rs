//! Gemini client error types.

use thiserror::Error;

/// Result type for Gemini operations.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Errors that can occur while talking to the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP request failed before or during the handshake.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The request could not be prepared for the event source.
    #[error("failed to prepare streaming request: {0}")]
    RequestNotCloneable(#[from] reqwest_eventsource::CannotCloneRequestError),

    /// Gemini rejected the request.
    #[error("Gemini API returned status {status}")]
    Api { status: u16 },

    /// The event stream broke mid-generation.
    #[error("stream error: {0}")]
    Stream(String),

    /// The connection closed before the SSE handshake completed.
    #[error("stream closed before the handshake completed")]
    HandshakeFailed,
}

impl GeminiError {
    /// Map an event-source error, separating status rejections from
    /// transport breakage.
    pub(super) fn from_event_source(err: reqwest_eventsource::Error) -> Self {
        match err {
            reqwest_eventsource::Error::InvalidStatusCode(status, _) => Self::Api {
                status: status.as_u16(),
            },
            reqwest_eventsource::Error::Transport(err) => Self::RequestFailed(err),
            other => Self::Stream(other.to_string()),
        }
    }
}
