//! Server-Sent Events protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, warn};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, SseCallTemplate};
use utcp_core::types::JsonObject;

use crate::auth::apply_auth;
use crate::http::{parse_manual_document, parse_response};
use crate::mapping::{map_arguments, render_path_params};
use crate::oauth::OAuth2TokenCache;
use crate::security::enforce_secure_url;

/// One decoded SSE event record.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Incremental decoder for the SSE wire format.
///
/// Feed it raw chunks; complete records (delimited by a blank line) come
/// back out. Multi-line `data:` fields are joined with `\n` per SSE
/// framing rules.
#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = Self::parse_record(record.trim_end_matches('\n')) {
                events.push(event);
            }
        }
        events
    }

    fn parse_record(record: &str) -> Option<SseEvent> {
        let mut event_type: Option<String> = None;
        let mut data_lines: Vec<String> = Vec::new();
        let mut id = None;
        let mut retry = None;

        for line in record.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value.to_string()),
                "id" => id = Some(value.to_string()),
                "retry" => retry = value.parse().ok(),
                _ => {}
            }
        }

        if data_lines.is_empty() && event_type.is_none() && id.is_none() {
            return None;
        }
        Some(SseEvent {
            event: event_type.unwrap_or_else(|| "message".to_string()),
            data: data_lines.join("\n"),
            id,
            retry,
        })
    }
}

/// The payload a consumer sees for one event: JSON when the data parses,
/// the raw string otherwise.
fn event_value(event: &SseEvent) -> Value {
    serde_json::from_str(&event.data).unwrap_or_else(|_| Value::String(event.data.clone()))
}

async fn build_request(
    client: &reqwest::Client,
    template: &SseCallTemplate,
    mut args: JsonObject,
    context: &str,
    token_cache: &OAuth2TokenCache,
) -> UtcpResult<reqwest::RequestBuilder> {
    enforce_secure_url(&template.url)?;
    let url = render_path_params(&template.url, &mut args, context)?;

    let mut request = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .header(reqwest::header::CACHE_CONTROL, "no-cache");
    if let Some(headers) = &template.headers {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
    }
    request = apply_auth(request, template.auth.as_ref(), token_cache, client).await?;
    Ok(map_arguments(
        request,
        args,
        template.body_field.as_deref(),
        template.header_fields.as_deref(),
        "application/json",
    ))
}

/// The `sse` protocol: events in receipt order, optionally filtered by
/// event type, optionally reconnecting when the stream drops mid-flight.
pub struct SseProtocol {
    client: reqwest::Client,
    token_cache: Arc<OAuth2TokenCache>,
}

impl SseProtocol {
    pub fn new() -> UtcpResult<Self> {
        // No client-level timeout: event streams are long-lived by design.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| UtcpError::config_invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token_cache: Arc::new(OAuth2TokenCache::new()),
        })
    }

    fn template<'a>(template: &'a CallTemplate) -> UtcpResult<&'a SseCallTemplate> {
        match template {
            CallTemplate::Sse(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "sse protocol received a '{}' template",
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl CommunicationProtocol for SseProtocol {
    /// Discovery is a plain request to the template URL; the body is a UTCP
    /// manual or an OpenAPI document, not an event stream.
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let sse = Self::template(template)?;
        enforce_secure_url(&sse.url)?;
        let context = sse.name.as_deref().unwrap_or("sse manual");

        let outcome = async {
            let mut request = self
                .client
                .get(&sse.url)
                .timeout(Duration::from_secs(
                    utcp_core::config::DEFAULT_REQUEST_TIMEOUT_SECS,
                ));
            if let Some(headers) = &sse.headers {
                for (name, value) in headers {
                    request = request.header(name.as_str(), value.as_str());
                }
            }
            let request =
                apply_auth(request, sse.auth.as_ref(), &self.token_cache, &self.client).await?;
            let response = request.send().await.map_err(|e| {
                UtcpError::call_failed(context, format!("discovery request failed: {e}"))
            })?;
            let body = parse_response(response, context).await?;
            parse_manual_document(&body, Some(&sse.url), None)
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

    /// Every event the stream produces, as an ordered list.
    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value> {
        let mut stream = self.call_tool_streaming(tool_name, args, template).await?;
        let mut events = Vec::new();
        while let Some(chunk) = stream.next().await {
            events.push(chunk?);
        }
        Ok(Value::Array(events))
    }

    async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        let sse = Self::template(template)?.clone();
        enforce_secure_url(&sse.url)?;

        let (tx, rx) = mpsc::unbounded_channel::<UtcpResult<Value>>();
        let client = self.client.clone();
        let token_cache = Arc::clone(&self.token_cache);
        let args = args.clone();
        let context = tool_name.to_string();

        tokio::spawn(async move {
            loop {
                let request = match build_request(
                    &client,
                    &sse,
                    args.clone(),
                    &context,
                    &token_cache,
                )
                .await
                {
                    Ok(request) => request,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                let response = match request.send().await {
                    Ok(response) if response.status().is_success() => response,
                    Ok(response) => {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        let _ = tx.send(Err(UtcpError::call_failed(
                            &context,
                            format!("HTTP {status}: {body}"),
                        )));
                        return;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(UtcpError::call_failed(
                            &context,
                            format!("connection failed: {e}"),
                        )));
                        return;
                    }
                };

                let mut decoder = SseDecoder::new();
                let mut body = response.bytes_stream();
                let mut dropped = false;
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for event in decoder.push(&String::from_utf8_lossy(&bytes)) {
                                if let Some(filter) = &sse.event_type {
                                    if &event.event != filter {
                                        continue;
                                    }
                                }
                                if tx.send(Ok(event_value(&event))).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(tool = %context, error = %e, "event stream dropped");
                            dropped = true;
                            break;
                        }
                    }
                }

                if dropped && sse.reconnect {
                    tokio::time::sleep(Duration::from_millis(sse.retry_timeout)).await;
                    continue;
                }
                // Normal end of stream.
                return;
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn close(&self) -> UtcpResult<()> {
        self.token_cache.clear().await;
        Ok(())
    }
}
