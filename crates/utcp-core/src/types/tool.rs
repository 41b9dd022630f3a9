//! Tool and manual definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::call_template::CallTemplate;

/// Version string stamped into manuals produced by this implementation.
pub const UTCP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_utcp_version() -> String {
    UTCP_VERSION.to_string()
}

fn default_manual_version() -> String {
    "1.0.0".to_string()
}

fn empty_schema() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A callable operation with input/output schemas and an invocation recipe.
///
/// Once registered, `name` is fully qualified as `<manual>.<tool>`; the
/// repository rejects nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema for the tool's arguments. Carried opaquely; validation
    /// is a caller concern.
    #[serde(default = "empty_schema")]
    pub inputs: Value,

    /// JSON Schema for the tool's result.
    #[serde(default = "empty_schema")]
    pub outputs: Value,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Typical response size in bytes, for callers planning context use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_response_size: Option<u64>,

    pub tool_call_template: CallTemplate,
}

impl Tool {
    /// The sub-name after the last dot, used for ranking and display.
    pub fn local_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// A catalog of tool definitions returned by a provider during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtcpManual {
    #[serde(default = "default_utcp_version")]
    pub utcp_version: String,

    #[serde(default = "default_manual_version")]
    pub manual_version: String,

    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl Default for UtcpManual {
    fn default() -> Self {
        Self {
            utcp_version: default_utcp_version(),
            manual_version: default_manual_version(),
            tools: Vec::new(),
        }
    }
}

impl UtcpManual {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    /// Whether a JSON document looks like a UTCP manual rather than an
    /// OpenAPI document: manuals carry a top-level `tools` array.
    pub fn looks_like_manual(value: &Value) -> bool {
        value.get("tools").map(Value::is_array).unwrap_or(false)
    }
}
