//! HTTP transport layer.
//!
//! Routing, body parsing and response conversion for `tiny_http`.

mod http;

pub use http::{handle_request, serve};
