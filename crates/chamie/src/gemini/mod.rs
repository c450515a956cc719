//! Google Gemini client module.
//!
//! Streams `streamGenerateContent` responses over SSE.

mod client;
mod error;
mod types;

pub use client::GeminiClient;
pub use error::{GeminiError, GeminiResult};
pub use types::*;
