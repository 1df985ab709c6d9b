//! WebSocket-facing event types and handlers.

pub mod handlers;
pub mod message_types;

pub use message_types::{ClientEvent, ServerEvent};
