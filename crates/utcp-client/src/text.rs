//! Text protocol: manuals from local documents.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, TextCallTemplate};
use utcp_core::types::tool::UtcpManual;
use utcp_core::types::JsonObject;
use utcp_http::openapi::{is_openapi_document, OpenApiConverter};

/// Loads manuals from inline content or a file on disk. Inline `content`
/// takes precedence when both are configured. Accepts UTCP manual JSON or
/// an OpenAPI document, which is converted in-process.
pub struct TextProtocol {
    root_dir: PathBuf,
}

impl TextProtocol {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn template<'a>(template: &'a CallTemplate) -> UtcpResult<&'a TextCallTemplate> {
        match template {
            CallTemplate::Text(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "text protocol received a '{}' template",
                other.kind()
            ))),
        }
    }

    async fn load_document(&self, template: &TextCallTemplate) -> UtcpResult<String> {
        if let Some(content) = &template.content {
            return Ok(content.clone());
        }
        let Some(file_path) = &template.file_path else {
            return Err(UtcpError::config_invalid(
                "text template needs `content` or `file_path`".to_string(),
            ));
        };
        let path = self.root_dir.join(file_path);
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    fn parse_manual(
        template: &TextCallTemplate,
        document: &str,
    ) -> UtcpResult<UtcpManual> {
        let value: Value = serde_json::from_str(document)?;
        if is_openapi_document(&value) {
            OpenApiConverter::new(&value, None, template.auth_tools.as_ref()).convert()
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }
}

#[async_trait]
impl CommunicationProtocol for TextProtocol {
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let text = Self::template(template)?;
        let context = text.name.as_deref().unwrap_or("text manual");

        let outcome = async {
            let document = self.load_document(text).await?;
            Self::parse_manual(text, &document)
        }
        .await;

        match outcome {
            Ok(manual) => {
                debug!(manual = %context, tools = manual.tools.len(), "loaded manual");
                Ok(RegisterManualResult::ok(template.clone(), manual))
            }
            Err(e) => {
                error!(manual = %context, error = %e, "manual load failed");
                Ok(RegisterManualResult::failed(
                    template.clone(),
                    vec![e.to_string()],
                ))
            }
        }
    }

    async fn deregister_manual(&self, _template: &CallTemplate) -> UtcpResult<()> {
        Ok(())
    }

    /// Text manuals describe tools that invoke other protocols; the text
    /// protocol itself has nothing to call.
    async fn call_tool(
        &self,
        tool_name: &str,
        _args: &JsonObject,
        _template: &CallTemplate,
    ) -> UtcpResult<Value> {
        Err(UtcpError::call_failed(
            tool_name,
            "text templates provide manuals, not callable tools".to_string(),
        ))
    }

    async fn call_tool_streaming(
        &self,
        _tool_name: &str,
        _args: &JsonObject,
        _template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        Err(UtcpError::StreamingUnsupported("text".to_string()))
    }

    async fn close(&self) -> UtcpResult<()> {
        Ok(())
    }
}
