//! WebSocket upgrade handlers for the web layer.
//!
//! Authentication, keep-alive and delivery live in the `push` crate; these
//! handlers only upgrade the request and hand the socket halves over.

pub mod handler;
