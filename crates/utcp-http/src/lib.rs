//! # UTCP HTTP
//!
//! The HTTP family of UTCP communication protocols:
//!
//! - [`HttpProtocol`]: request/response calls with header, body, path, and
//!   query mapping, plus manual discovery with in-process OpenAPI
//!   conversion.
//! - [`StreamableHttpProtocol`]: chunked body streaming.
//! - [`SseProtocol`]: Server-Sent Events with an incremental framing
//!   decoder and optional reconnect.
//!
//! All three share the URL security gate (HTTPS or loopback HTTP only),
//! the auth application rules, and a per-protocol OAuth2
//! client-credentials token cache.

pub mod auth;
pub mod http;
pub mod oauth;
pub mod openapi;
pub mod security;
pub mod sse;
pub mod streamable;

pub(crate) mod mapping;

pub use http::HttpProtocol;
pub use oauth::OAuth2TokenCache;
pub use openapi::{is_openapi_document, OpenApiConverter};
pub use security::enforce_secure_url;
pub use sse::{SseDecoder, SseEvent, SseProtocol};
pub use streamable::StreamableHttpProtocol;
