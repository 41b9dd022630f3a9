//! Wire-level data model: tools, manuals, call templates, and auth schemes.

pub mod auth;
pub mod call_template;
pub mod tool;

pub use auth::{ApiKeyAuth, ApiKeyLocation, Auth, BasicAuth, OAuth2Auth};
pub use call_template::{
    CallTemplate, CliCallTemplate, CommandStep, DirectCallTemplate, HttpCallTemplate, HttpMethod,
    McpCallTemplate, McpServerConfig, SseCallTemplate, StreamableHttpCallTemplate,
    TextCallTemplate,
};
pub use tool::{Tool, UtcpManual};

/// A JSON object, the shape tool arguments arrive in.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
