//! Chamie server library.
//!
//! The binary crates (`chamie`, `chamiectl`) and the integration tests all
//! build on these modules.

pub mod api;
pub mod config;
pub mod gemini;
pub mod generation;
pub mod prompt;
