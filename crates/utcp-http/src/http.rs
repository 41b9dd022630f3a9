//! HTTP request/response protocol.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tracing::{debug, error};

use utcp_core::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, HttpCallTemplate};
use utcp_core::types::tool::UtcpManual;
use utcp_core::types::JsonObject;

use crate::auth::apply_auth;
use crate::mapping::{map_arguments, render_path_params};
use crate::oauth::OAuth2TokenCache;
use crate::openapi::{is_openapi_document, OpenApiConverter};
use crate::security::enforce_secure_url;

/// The `http` protocol: one request, one response.
pub struct HttpProtocol {
    client: reqwest::Client,
    token_cache: OAuth2TokenCache,
}

impl HttpProtocol {
    pub fn new() -> UtcpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| UtcpError::config_invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token_cache: OAuth2TokenCache::new(),
        })
    }

    fn template<'a>(template: &'a CallTemplate) -> UtcpResult<&'a HttpCallTemplate> {
        match template {
            CallTemplate::Http(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "http protocol received a '{}' template",
                other.kind()
            ))),
        }
    }

    async fn build_request(
        &self,
        template: &HttpCallTemplate,
        mut args: JsonObject,
        context: &str,
    ) -> UtcpResult<reqwest::RequestBuilder> {
        enforce_secure_url(&template.url)?;
        let url = render_path_params(&template.url, &mut args, context)?;

        let method = reqwest::Method::from_bytes(template.http_method.as_str().as_bytes())
            .map_err(|e| UtcpError::config_invalid(format!("invalid method: {e}")))?;
        let mut request = self
            .client
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, template.content_type.as_str());

        if let Some(headers) = &template.headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        request = apply_auth(request, template.auth.as_ref(), &self.token_cache, &self.client)
            .await?;
        Ok(map_arguments(
            request,
            args,
            template.body_field.as_deref(),
            template.header_fields.as_deref(),
            &template.content_type,
        ))
    }
}

/// Parse a response body: JSON when the server says JSON, raw text
/// otherwise. Non-2xx statuses fail with the body attached.
pub(crate) async fn parse_response(
    response: reqwest::Response,
    context: &str,
) -> UtcpResult<Value> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UtcpError::call_failed(
            context,
            format!("HTTP {status}: {body}"),
        ));
    }

    if is_json {
        response
            .json()
            .await
            .map_err(|e| UtcpError::call_failed(context, format!("invalid JSON response: {e}")))
    } else {
        let text = response
            .text()
            .await
            .map_err(|e| UtcpError::call_failed(context, format!("failed to read body: {e}")))?;
        Ok(Value::String(text))
    }
}

/// Interpret a discovery response as either a UTCP manual or an OpenAPI
/// document to convert.
pub(crate) fn parse_manual_document(
    body: &Value,
    source_url: Option<&str>,
    auth_tools: Option<&utcp_core::types::auth::Auth>,
) -> UtcpResult<UtcpManual> {
    if is_openapi_document(body) {
        OpenApiConverter::new(body, source_url, auth_tools).convert()
    } else {
        Ok(serde_json::from_value(body.clone())?)
    }
}

#[async_trait]
impl CommunicationProtocol for HttpProtocol {
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let http = Self::template(template)?;
        let context = http.name.as_deref().unwrap_or("http manual");
        let request = self.build_request(http, JsonObject::new(), context).await?;

        let outcome = async {
            let response = request.send().await.map_err(|e| {
                UtcpError::call_failed(context, format!("discovery request failed: {e}"))
            })?;
            let body = parse_response(response, context).await?;
            parse_manual_document(&body, Some(&http.url), http.auth_tools.as_ref())
        }
        .await;

        match outcome {
            Ok(manual) => {
                debug!(manual = %context, tools = manual.tools.len(), "discovered manual");
                Ok(RegisterManualResult::ok(template.clone(), manual))
            }
            Err(e) => {
                error!(manual = %context, error = %e, "manual discovery failed");
                Ok(RegisterManualResult::failed(
                    template.clone(),
                    vec![e.to_string()],
                ))
            }
        }
    }

    async fn deregister_manual(&self, _template: &CallTemplate) -> UtcpResult<()> {
        // Request/response HTTP holds nothing per manual.
        Ok(())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value> {
        let http = Self::template(template)?;
        let request = self.build_request(http, args.clone(), tool_name).await?;
        let response = request
            .send()
            .await
            .map_err(|e| UtcpError::call_failed(tool_name, format!("request failed: {e}")))?;
        parse_response(response, tool_name).await
    }

    async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        // Request/response HTTP has no chunking; the whole result is one chunk.
        let result = self.call_tool(tool_name, args, template).await?;
        Ok(Box::pin(stream::iter([Ok::<_, UtcpError>(result)])))
    }

    async fn close(&self) -> UtcpResult<()> {
        self.token_cache.clear().await;
        Ok(())
    }
}
