//! Chunked HTTP streaming protocol.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, HttpMethod, StreamableHttpCallTemplate};
use utcp_core::types::JsonObject;

use crate::auth::apply_auth;
use crate::http::{parse_manual_document, parse_response};
use crate::mapping::{map_arguments, render_path_params};
use crate::oauth::OAuth2TokenCache;
use crate::security::enforce_secure_url;

/// The `streamable_http` protocol: body chunks in receipt order.
pub struct StreamableHttpProtocol {
    client: reqwest::Client,
    token_cache: OAuth2TokenCache,
}

impl StreamableHttpProtocol {
    pub fn new() -> UtcpResult<Self> {
        // No client-level timeout; each request carries the template's own.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| UtcpError::config_invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token_cache: OAuth2TokenCache::new(),
        })
    }

    fn template<'a>(
        template: &'a CallTemplate,
    ) -> UtcpResult<&'a StreamableHttpCallTemplate> {
        match template {
            CallTemplate::StreamableHttp(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "streamable_http protocol received a '{}' template",
                other.kind()
            ))),
        }
    }

    async fn build_request(
        &self,
        template: &StreamableHttpCallTemplate,
        mut args: JsonObject,
        context: &str,
    ) -> UtcpResult<reqwest::RequestBuilder> {
        enforce_secure_url(&template.url)?;
        if !matches!(template.http_method, HttpMethod::Get | HttpMethod::Post) {
            return Err(UtcpError::config_invalid(format!(
                "streamable_http supports GET and POST, got {}",
                template.http_method.as_str()
            )));
        }
        let url = render_path_params(&template.url, &mut args, context)?;

        let method = if template.http_method == HttpMethod::Post {
            reqwest::Method::POST
        } else {
            reqwest::Method::GET
        };
        let mut request = self
            .client
            .request(method, &url)
            .timeout(Duration::from_millis(template.timeout))
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

    async fn send(
        &self,
        template: &StreamableHttpCallTemplate,
        args: JsonObject,
        context: &str,
    ) -> UtcpResult<reqwest::Response> {
        let request = self.build_request(template, args, context).await?;
        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UtcpError::timeout(context.to_string())
                } else {
                    UtcpError::call_failed(context, format!("request failed: {e}"))
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UtcpError::call_failed(
                context,
                format!("HTTP {status}: {body}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl CommunicationProtocol for StreamableHttpProtocol {
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let streamable = Self::template(template)?;
        enforce_secure_url(&streamable.url)?;
        let context = streamable.name.as_deref().unwrap_or("streamable manual");

        let outcome = async {
            let request = self
                .build_request(streamable, JsonObject::new(), context)
                .await?;
            let response = request.send().await.map_err(|e| {
                UtcpError::call_failed(context, format!("discovery request failed: {e}"))
            })?;
            let body = parse_response(response, context).await?;
            parse_manual_document(&body, Some(&streamable.url), None)
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
        Ok(())
    }

    /// The concatenation of every chunk, parsed as JSON when the server
    /// declared JSON.
    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value> {
        let streamable = Self::template(template)?;
        let response = self.send(streamable, args.clone(), tool_name).await?;
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UtcpError::call_failed(tool_name, format!("failed to read body: {e}")))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if is_json {
            serde_json::from_str(&text).map_err(|e| {
                UtcpError::call_failed(tool_name, format!("invalid JSON response: {e}"))
            })
        } else {
            Ok(Value::String(text))
        }
    }

    async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        let streamable = Self::template(template)?;
        let response = self.send(streamable, args.clone(), tool_name).await?;
        let context = tool_name.to_string();
        let stream = response.bytes_stream().map(move |chunk| match chunk {
            Ok(bytes) => Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) => {
                if e.is_timeout() {
                    Err(UtcpError::timeout(context.clone()))
                } else {
                    Err(UtcpError::call_failed(&context, format!("stream failed: {e}")))
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> UtcpResult<()> {
        self.token_cache.clear().await;
        Ok(())
    }
}
