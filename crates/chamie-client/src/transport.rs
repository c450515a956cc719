//! HTTP transport for the chat endpoint.
//!
//! Posts the request body and decodes the SSE response incrementally with
//! [`SseDecoder`], so chunk boundaries from the network never influence the
//! reconstructed message.

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

use chamie_protocol::{ChatRequest, ErrorResponse};

use crate::consumer::SseDecoder;
use crate::error::ClientError;
use crate::session::{ChatTransport, EventStream};

/// Client for the Chamie chat API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    /// Base URL of the server (e.g. "http://localhost:8035").
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream, ClientError> {
        let url = self.chat_url();
        debug!(url = %url, "opening chat stream");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            // Validation and upstream failures arrive as a JSON error body.
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => format!("request failed with status {status}"),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes_stream();
        let stream = futures::stream::unfold(
            (body, SseDecoder::new(), false),
            |(mut body, mut decoder, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    match body.next().await {
                        Some(Ok(bytes)) => {
                            let events = decoder.feed(&bytes);
                            if !events.is_empty() {
                                let batch: Vec<_> = events.into_iter().map(Ok).collect();
                                return Some((batch, (body, decoder, false)));
                            }
                            // Chunk completed no frame; keep reading.
                        }
                        Some(Err(err)) => {
                            return Some((vec![Err(ClientError::Http(err))], (body, decoder, true)));
                        }
                        None => {
                            // EOF can land mid-frame; flush what remains.
                            let batch: Vec<_> = decoder.finish().into_iter().map(Ok).collect();
                            return Some((batch, (body, decoder, true)));
                        }
                    }
                }
            },
        )
        .flat_map(futures::stream::iter);

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_joins_cleanly() {
        let transport = HttpTransport::new("http://localhost:8035/").unwrap();
        assert_eq!(transport.chat_url(), "http://localhost:8035/api/chat");
    }
}
