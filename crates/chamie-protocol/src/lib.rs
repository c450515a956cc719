//! Canonical wire types for the Chamie chat API.
//!
//! Both sides of the wire depend on this crate: the server deserializes
//! [`ChatRequest`] bodies and emits [`StreamEvent`] frames, the client crate
//! builds requests and decodes the frames back out of the SSE byte stream.

pub mod events;
pub mod messages;

pub use events::{DONE_SENTINEL, FrameError, StreamEvent};
pub use messages::{ChatMessage, ChatRequest, ErrorResponse, Role};
