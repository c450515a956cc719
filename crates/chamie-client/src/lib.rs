//! Client core for Chamie.
//!
//! Everything the chat frontend needs short of rendering: conversation
//! state, the incremental SSE stream consumer that reassembles streamed
//! fragments into messages, the truncation heuristic, the user-gated
//! continue-generation flow, and uploaded-file context handling.
//!
//! The crate is UI-free. `chamiectl` drives it from a terminal; tests drive
//! it through [`ChatTransport`] mocks.

pub mod consumer;
pub mod conversation;
pub mod error;
pub mod file_context;
pub mod session;
pub mod transport;
pub mod truncation;

pub use consumer::SseDecoder;
pub use conversation::{Conversation, Message};
pub use error::ClientError;
pub use file_context::FileContext;
pub use session::{ChatSession, ChatTransport, EventStream, MessageState, StreamOutcome};
pub use transport::HttpTransport;
pub use truncation::{TruncationPolicy, is_likely_truncated};
