//! Helpers shared by adapters, upstream dispatch and the orchestrator.

pub mod sanitize_error;
pub mod sse_parser;

pub use sanitize_error::sanitize_upstream_error;
pub use sse_parser::{SseDecoder, SseEvent};
