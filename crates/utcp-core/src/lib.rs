//! # UTCP Core
//!
//! Core building blocks of the Universal Tool Calling Protocol client
//! runtime: the wire-level data model (tools, manuals, call templates,
//! auth), the client configuration document, the namespaced variable
//! substitution engine, the concurrency-safe tool repository, lexical tool
//! search, result post-processing, and the plugin registries plus the
//! `CommunicationProtocol` contract every transport implements.
//!
//! This crate has no transport of its own. The HTTP family lives in
//! `utcp-http`, the command-line protocol in `utcp-cli`, and the client
//! facade that wires everything together in `utcp-client`.
//!
//! ## Extension points
//!
//! Every pluggable concern is selected by a string discriminator in the
//! configuration and resolved through a [`registry::Registry`]:
//!
//! - communication protocols (`call_template_type`)
//! - tool repositories (`tool_repository_type`)
//! - search strategies (`tool_search_strategy_type`)
//! - post-processors (`tool_post_processor_type`)
//! - variable loaders (`variable_loader_type`)
//!
//! Unknown call-template kinds survive deserialization as
//! [`types::CallTemplate::Other`] and only fail at dispatch, so a plugin
//! registered before the first lookup can claim them.

pub mod config;
pub mod error;
pub mod postprocess;
pub mod protocol;
pub mod registry;
pub mod repository;
pub mod search;
pub mod types;
pub mod variables;

pub(crate) mod tagged;

pub use config::UtcpClientConfig;
pub use error::{UtcpError, UtcpResult};
pub use protocol::{CommunicationProtocol, ProtocolDispatcher, RegisterManualResult, ToolStream};
pub use repository::{ConcurrentToolRepository, InMemToolRepository};
pub use search::{TagAndDescriptionWordMatchStrategy, ToolSearchStrategy};
pub use types::{Auth, CallTemplate, JsonObject, Tool, UtcpManual};
