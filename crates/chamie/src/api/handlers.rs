//! Request handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::header,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, instrument};

use chamie_protocol::{ChatRequest, StreamEvent};

use crate::generation::GenerationRequest;
use crate::prompt;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/chat — stream a generated answer as SSE.
///
/// Validation failures are plain JSON error responses; once streaming has
/// started, upstream failures arrive in-band as a terminal error event.
#[instrument(skip(state, request))]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let parts = request.into_parts();

    if parts.messages.is_empty() || parts.messages.iter().all(|m| m.content.trim().is_empty()) {
        return Err(ApiError::bad_request("Send at least one message."));
    }
    // Gated before any upstream call: the client asked for file grounding
    // but no file content came along.
    if parts.require_file_context && parts.file_context.is_none() {
        return Err(ApiError::bad_request(
            "Please upload a .txt file first to ask questions about its content.",
        ));
    }

    let generation = GenerationRequest {
        system_prompt: prompt::build_system_prompt(parts.file_context.as_deref()),
        history: parts.messages,
    };

    let mut fragments = state
        .backend
        .stream_generate(generation)
        .await
        .map_err(|err| {
            ApiError::bad_gateway(format!("The AI service is unavailable, try again: {err}"))
        })?;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    tokio::spawn(async move {
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    let event = StreamEvent::Content(fragment);
                    if tx.send(Ok(sse_event(&event))).await.is_err() {
                        // Client went away; drop the upstream stream.
                        debug!("chat client disconnected mid-stream");
                        return;
                    }
                }
                Err(err) => {
                    error!(error = %err, "generation stream failed");
                    let event =
                        StreamEvent::Error("Generation failed, please try again.".to_string());
                    let _ = tx.send(Ok(sse_event(&event))).await;
                    return;
                }
            }
        }
        let _ = tx.send(Ok(sse_event(&StreamEvent::Done))).await;
    });

    let stream = ReceiverStream::new(rx);
    let sse = Sse::new(stream).keep_alive(KeepAlive::default());

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse,
    ))
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().data(event.to_data_payload())
}
