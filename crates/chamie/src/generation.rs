//! Seam between the API layer and the upstream generation provider.
//!
//! Handlers only see this trait; the Gemini implementation lives in
//! [`crate::gemini`] and tests substitute scripted backends.

use async_trait::async_trait;
use futures::stream::BoxStream;

use chamie_protocol::ChatMessage;

/// Text fragments as the upstream emits them. An `Err` item is terminal.
pub type FragmentStream = BoxStream<'static, anyhow::Result<String>>;

/// One generation to run: persona/grounding prompt plus the conversation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
}

/// Streaming text generation provider.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a generation stream.
    ///
    /// Implementations complete the upstream handshake before returning, so
    /// connection and auth failures surface here as an `Err` and become a
    /// proper error response instead of a broken event stream.
    async fn stream_generate(&self, request: GenerationRequest) -> anyhow::Result<FragmentStream>;
}
