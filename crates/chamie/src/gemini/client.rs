//! Streaming Gemini HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event as SseEvent, EventSource};
use tracing::{debug, warn};

use crate::config::GeminiSettings;
use crate::generation::{FragmentStream, GenerationBackend, GenerationRequest};

use super::error::{GeminiError, GeminiResult};
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};

/// Gemini has no system role; the persona goes in as the opening user turn
/// and this canned acknowledgement closes it, so the real conversation
/// starts from a model turn.
const PERSONA_ACK: &str = "Understood! I am Chamie and I'm ready to help. What would you like to know?";

/// Client for the Gemini `streamGenerateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    /// e.g. "https://generativelanguage.googleapis.com/v1beta".
    base_url: String,
    api_key: String,
    model: String,
    generation_config: GenerationConfig,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings, api_key: impl Into<String>) -> GeminiResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            generation_config: GenerationConfig::from(settings),
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_contents(request: &GenerationRequest) -> Vec<Content> {
        let mut contents = Vec::with_capacity(request.history.len() + 2);
        contents.push(Content::user(request.system_prompt.clone()));
        contents.push(Content::model(PERSONA_ACK));
        contents.extend(request.history.iter().map(Content::from_message));
        contents
    }

    /// Open a generation stream, completing the SSE handshake first.
    pub async fn open_stream(
        &self,
        request: GenerationRequest,
    ) -> GeminiResult<impl futures::Stream<Item = GeminiResult<String>> + use<>> {
        let body = GenerateContentRequest {
            contents: Self::build_contents(&request),
            generation_config: self.generation_config.clone(),
        };
        let builder = self.client.post(self.stream_url()).json(&body);
        let mut es = EventSource::new(builder)?;

        // Await the Open event so a rejected request becomes an Err here
        // rather than a dead stream. A message arriving first is kept and
        // replayed as the stream's first item.
        let mut pending = None;
        match es.next().await {
            Some(Ok(SseEvent::Open)) => {}
            Some(Ok(SseEvent::Message(message))) => pending = Some(message),
            Some(Err(err)) => {
                es.close();
                return Err(GeminiError::from_event_source(err));
            }
            None => return Err(GeminiError::HandshakeFailed),
        }
        debug!(model = %self.model, "gemini stream open");

        let stream = futures::stream::unfold((es, pending), |(mut es, mut pending)| async move {
            loop {
                let event = match pending.take() {
                    Some(message) => Ok(SseEvent::Message(message)),
                    None => match es.next().await {
                        Some(event) => event,
                        None => return None,
                    },
                };
                match event {
                    Ok(SseEvent::Open) => continue,
                    Ok(SseEvent::Message(message)) => {
                        match serde_json::from_str::<GenerateContentResponse>(&message.data) {
                            Ok(chunk) => {
                                let text = chunk.first_text();
                                if text.is_empty() {
                                    // Metadata-only chunk; nothing to relay.
                                    continue;
                                }
                                return Some((Ok(text), (es, None)));
                            }
                            Err(err) => {
                                warn!(error = %err, "skipping malformed gemini chunk");
                                continue;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => return None,
                    Err(err) => {
                        // Terminal: close so the next poll ends the stream.
                        es.close();
                        return Some((Err(GeminiError::from_event_source(err)), (es, None)));
                    }
                }
            }
        });

        Ok(stream)
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn stream_generate(&self, request: GenerationRequest) -> anyhow::Result<FragmentStream> {
        let stream = self.open_stream(request).await?;
        Ok(stream.map(|item| item.map_err(anyhow::Error::from)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chamie_protocol::ChatMessage;

    fn settings() -> GeminiSettings {
        GeminiSettings::default()
    }

    #[test]
    fn test_stream_url_embeds_model_and_key() {
        let client = GeminiClient::new(&settings(), "k123").unwrap();
        assert_eq!(
            client.stream_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse&key=k123"
        );
    }

    #[test]
    fn test_contents_open_with_persona_and_ack() {
        let request = GenerationRequest {
            system_prompt: "You are Chamie.".to_string(),
            history: vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("Hello!"),
                ChatMessage::user("more"),
            ],
        };
        let contents = GeminiClient::build_contents(&request);
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text, "You are Chamie.");
        assert_eq!(contents[1].role, "model");
        // Assistant turns map to Gemini's "model" role.
        assert_eq!(contents[3].role, "model");
        assert_eq!(contents[4].parts[0].text, "more");
    }
}
