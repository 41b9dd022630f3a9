//! Communication-protocol contract and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::BoxStream;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{UtcpError, UtcpResult};
use crate::types::call_template::CallTemplate;
use crate::types::tool::UtcpManual;
use crate::types::JsonObject;

/// Ordered chunks produced by a streaming tool call.
pub type ToolStream = BoxStream<'static, UtcpResult<Value>>;

/// Outcome of registering one manual.
#[derive(Debug, Clone)]
pub struct RegisterManualResult {
    pub manual_call_template: CallTemplate,
    pub manual: UtcpManual,
    pub success: bool,
    pub errors: Vec<String>,
}

impl RegisterManualResult {
    pub fn ok(manual_call_template: CallTemplate, manual: UtcpManual) -> Self {
        Self {
            manual_call_template,
            manual,
            success: true,
            errors: Vec::new(),
        }
    }

    /// A failed registration carries an empty manual so batch callers can
    /// treat every slot uniformly.
    pub fn failed(manual_call_template: CallTemplate, errors: Vec<String>) -> Self {
        Self {
            manual_call_template,
            manual: UtcpManual::new(Vec::new()),
            success: false,
            errors,
        }
    }
}

/// One transport implementation, keyed by its `call_template_type`.
///
/// Protocols are stateless with respect to individual manuals except where
/// the transport demands otherwise (token caches, live subprocesses);
/// `deregister_manual` releases whatever the protocol holds for a manual
/// and `close` releases everything.
#[async_trait]
pub trait CommunicationProtocol: Send + Sync {
    /// Discover the manual behind a call template.
    async fn register_manual(&self, template: &CallTemplate)
        -> UtcpResult<RegisterManualResult>;

    /// Release any per-manual resources.
    async fn deregister_manual(&self, template: &CallTemplate) -> UtcpResult<()>;

    /// Invoke a tool and return its final result.
    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value>;

    /// Invoke a tool and stream its chunks in receipt order.
    async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<ToolStream>;

    /// Tear down every resource held by the protocol.
    async fn close(&self) -> UtcpResult<()>;
}

/// Routes operations to the protocol registered for a template's kind.
#[derive(Default)]
pub struct ProtocolDispatcher {
    protocols: HashMap<String, Arc<dyn CommunicationProtocol>>,
}

impl ProtocolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: impl Into<String>, protocol: Arc<dyn CommunicationProtocol>) {
        self.protocols.insert(kind.into(), protocol);
    }

    pub fn get(&self, kind: &str) -> UtcpResult<Arc<dyn CommunicationProtocol>> {
        self.protocols
            .get(kind)
            .cloned()
            .ok_or_else(|| UtcpError::unknown_kind(kind, "communication_protocol"))
    }

    pub fn for_template(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<Arc<dyn CommunicationProtocol>> {
        self.get(template.kind())
    }

    pub fn kinds(&self) -> Vec<String> {
        self.protocols.keys().cloned().collect()
    }

    /// Close every distinct protocol concurrently. Failures are logged and
    /// swallowed so one broken transport cannot block the rest.
    pub async fn close_all(&self) {
        let closes = self.protocols.iter().map(|(kind, protocol)| {
            let kind = kind.clone();
            let protocol = Arc::clone(protocol);
            async move {
                if let Err(e) = protocol.close().await {
                    warn!(protocol = %kind, error = %e, "protocol close failed");
                } else {
                    debug!(protocol = %kind, "protocol closed");
                }
            }
        });
        join_all(closes).await;
    }
}
