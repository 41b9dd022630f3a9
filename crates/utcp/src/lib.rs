//! # UTCP
//!
//! Universal Tool Calling Protocol client runtime.
//!
//! **Primary API:** [`UtcpClient`]. It discovers manuals from heterogeneous
//! providers, invokes their tools behind one calling surface, and tears
//! everything down with `close()`.
//!
//! ## Example
//!
//! ```no_run
//! use utcp::{UtcpClient, UtcpClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> utcp::UtcpResult<()> {
//!     let config: UtcpClientConfig = serde_json::from_str(
//!         r#"{
//!             "manual_call_templates": [{
//!                 "call_template_type": "http",
//!                 "name": "weather_api",
//!                 "url": "https://api.weather.test/utcp"
//!             }]
//!         }"#,
//!     )?;
//!
//!     let client = UtcpClient::create(".", config).await?;
//!     for tool in client.search_tools("forecast", 5, None).await? {
//!         println!("{}: {}", tool.name, tool.description);
//!     }
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! The building blocks live in their own crates and are re-exported here:
//! `utcp-core` (data model, registries, repository, search, variables),
//! `utcp-http` (HTTP, streamable HTTP, SSE, OpenAPI conversion), `utcp-cli`
//! (command-line tools), and `utcp-client` (the facade plus the text and
//! direct-call protocols).

pub mod prelude;

pub use utcp_core::config::{
    PostProcessorConfig, ToolRepositoryConfig, ToolSearchStrategyConfig, UtcpClientConfig,
    VariableLoaderConfig,
};
pub use utcp_core::error::{UtcpError, UtcpResult};
pub use utcp_core::protocol::{
    CommunicationProtocol, ProtocolDispatcher, RegisterManualResult, ToolStream,
};
pub use utcp_core::registry::PROTOCOL_FACTORIES;
pub use utcp_core::repository::{ConcurrentToolRepository, InMemToolRepository};
pub use utcp_core::search::{TagAndDescriptionWordMatchStrategy, ToolSearchStrategy};
pub use utcp_core::types::{
    Auth, CallTemplate, CliCallTemplate, CommandStep, DirectCallTemplate, HttpCallTemplate,
    HttpMethod, JsonObject, McpCallTemplate, SseCallTemplate, StreamableHttpCallTemplate,
    TextCallTemplate, Tool, UtcpManual,
};
pub use utcp_core::variables::{find_required_variables, substitute_value, VariableResolver};

pub use utcp_cli::CliProtocol;
pub use utcp_client::{DirectCallProtocol, TextProtocol, UtcpClient};
pub use utcp_http::{
    HttpProtocol, OpenApiConverter, SseDecoder, SseProtocol, StreamableHttpProtocol,
};
