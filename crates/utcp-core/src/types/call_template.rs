//! Call templates: the typed invocation recipes behind manuals and tools.
//!
//! A call template identifies a transport and everything needed to reach it.
//! The `call_template_type` discriminator selects the communication protocol
//! the dispatcher routes to. Manuals are registered from a template, and
//! every tool inside a manual carries its own `tool_call_template`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tagged::tagged_union;
use crate::types::auth::Auth;

/// HTTP verbs supported by the request/response protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

fn default_json_content_type() -> String {
    "application/json".to_string()
}

fn default_octet_stream_content_type() -> String {
    "application/octet-stream".to_string()
}

fn default_chunk_size() -> usize {
    4096
}

fn default_stream_timeout_ms() -> u64 {
    60_000
}

fn default_reconnect() -> bool {
    true
}

fn default_retry_timeout_ms() -> u64 {
    30_000
}

/// Template for the HTTP request/response protocol.
///
/// The URL may contain `{path_param}` placeholders filled from tool inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub url: String,

    #[serde(default)]
    pub http_method: HttpMethod,

    #[serde(default = "default_json_content_type")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    /// Static headers sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Name of the single input that becomes the request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_field: Option<String>,

    /// Names of inputs that become request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fields: Option<Vec<String>>,

    /// Auth to attach to tools generated from an OpenAPI document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tools: Option<Auth>,
}

/// Template for the chunked HTTP streaming protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamableHttpCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub url: String,

    #[serde(default)]
    pub http_method: HttpMethod,

    #[serde(default = "default_octet_stream_content_type")]
    pub content_type: String,

    /// Read-buffer hint, not a framing guarantee.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_stream_timeout_ms")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fields: Option<Vec<String>>,
}

/// Template for the Server-Sent Events protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub url: String,

    /// When set, only events of this type are yielded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    /// Delay before reconnecting, in milliseconds.
    #[serde(default = "default_retry_timeout_ms")]
    pub retry_timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fields: Option<Vec<String>>,
}

/// One sub-server of an MCP call template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum McpServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
    Http {
        url: String,
    },
}

/// Template for Model Context Protocol servers.
///
/// The MCP protocol itself ships as an external plugin; this variant only
/// carries its configuration so manuals referencing MCP servers parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub config: McpConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

/// Template for manuals loaded from a local document.
///
/// `content` takes precedence over `file_path` when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Auth to attach to tools generated from an OpenAPI document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tools: Option<Auth>,
}

/// One step of a CLI call template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStep {
    pub command: String,

    /// Whether this step's captured output is part of the final result.
    /// Defaults to true for the last step and false for the rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_to_final_output: Option<bool>,
}

/// Template for the local command-line protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub commands: Vec<CommandStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

/// Template for in-process callables registered on the direct-call protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectCallTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub callable_name: String,
}

tagged_union! {
    /// Tagged call template, discriminated by `call_template_type`.
    pub enum CallTemplate, tag = "call_template_type" {
        "http" => Http(HttpCallTemplate),
        "streamable_http" => StreamableHttp(StreamableHttpCallTemplate),
        "sse" => Sse(SseCallTemplate),
        "mcp" => Mcp(McpCallTemplate),
        "text" => Text(TextCallTemplate),
        "cli" => Cli(CliCallTemplate),
        "direct-call" => DirectCall(DirectCallTemplate),
    }
}

impl CallTemplate {
    /// The manual name carried by this template, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            CallTemplate::Http(t) => t.name.as_deref(),
            CallTemplate::StreamableHttp(t) => t.name.as_deref(),
            CallTemplate::Sse(t) => t.name.as_deref(),
            CallTemplate::Mcp(t) => t.name.as_deref(),
            CallTemplate::Text(t) => t.name.as_deref(),
            CallTemplate::Cli(t) => t.name.as_deref(),
            CallTemplate::DirectCall(t) => t.name.as_deref(),
            CallTemplate::Other { document, .. } => {
                document.get("name").and_then(Value::as_str)
            }
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            CallTemplate::Http(t) => t.name = Some(name),
            CallTemplate::StreamableHttp(t) => t.name = Some(name),
            CallTemplate::Sse(t) => t.name = Some(name),
            CallTemplate::Mcp(t) => t.name = Some(name),
            CallTemplate::Text(t) => t.name = Some(name),
            CallTemplate::Cli(t) => t.name = Some(name),
            CallTemplate::DirectCall(t) => t.name = Some(name),
            CallTemplate::Other { document, .. } => {
                if let Value::Object(map) = document {
                    map.insert("name".to_string(), Value::String(name));
                }
            }
        }
    }

    /// The auth scheme attached to this template, where the protocol has one.
    pub fn auth(&self) -> Option<&Auth> {
        match self {
            CallTemplate::Http(t) => t.auth.as_ref(),
            CallTemplate::StreamableHttp(t) => t.auth.as_ref(),
            CallTemplate::Sse(t) => t.auth.as_ref(),
            CallTemplate::Mcp(t) => t.auth.as_ref(),
            _ => None,
        }
    }
}
