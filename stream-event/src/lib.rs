//! Scheduler notification protocol.
//!
//! This crate defines the wire shape of one scheduler notification, independent of
//! the `core` crate's in-process types, so the same shape can be reused by a gateway
//! that relays notifications over a wire (HTTP/SSE, websocket) without pulling in the
//! scheduler itself.

pub mod event;

pub use event::CoreEvent;
