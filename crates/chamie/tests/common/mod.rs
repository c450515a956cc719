//! Shared test harness: a scripted generation backend and router setup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use futures::StreamExt;

use chamie::api::{AppState, create_router};
use chamie::generation::{FragmentStream, GenerationBackend, GenerationRequest};

/// Scripted backend: each call pops the next canned fragment list and
/// records the request it was given.
pub struct MockBackend {
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
    scripts: Mutex<VecDeque<Vec<anyhow::Result<String>>>>,
    fail_to_open: bool,
}

impl MockBackend {
    pub fn scripted(scripts: Vec<Vec<anyhow::Result<String>>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            scripts: Mutex::new(scripts.into_iter().collect()),
            fail_to_open: false,
        })
    }

    /// Backend whose handshake always fails, as if Gemini rejected the key.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
            fail_to_open: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn stream_generate(&self, request: GenerationRequest) -> anyhow::Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.fail_to_open {
            anyhow::bail!("connection refused");
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(futures::stream::iter(script).boxed())
    }
}

pub fn test_app(backend: Arc<MockBackend>) -> Router {
    create_router(AppState::new(backend, Vec::new()))
}

pub fn ok(fragment: &str) -> anyhow::Result<String> {
    Ok(fragment.to_string())
}
