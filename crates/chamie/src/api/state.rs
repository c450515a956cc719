//! Application state shared across handlers.

use std::sync::Arc;

use crate::generation::GenerationBackend;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The generation provider. Trait object so tests can script it.
    pub backend: Arc<dyn GenerationBackend>,
    /// CORS origins from config; empty means permissive localhost defaults.
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(backend: Arc<dyn GenerationBackend>, allowed_origins: Vec<String>) -> Self {
        Self {
            backend,
            allowed_origins,
        }
    }
}
