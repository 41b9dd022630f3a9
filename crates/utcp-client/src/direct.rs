//! In-process direct-call protocol.
//!
//! Callables are async functions registered on the protocol by name. A
//! `direct-call` template's `callable_name` selects which one runs; the
//! callable invoked during manual registration is expected to return a
//! UTCP manual as its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream;
use serde_json::Value;
use tracing::{debug, error};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, DirectCallTemplate};
use utcp_core::types::tool::UtcpManual;
use utcp_core::types::JsonObject;

/// A process-local tool implementation.
pub type DirectCallable =
    Arc<dyn Fn(JsonObject) -> BoxFuture<'static, UtcpResult<Value>> + Send + Sync>;

/// The `direct-call` protocol.
#[derive(Default)]
pub struct DirectCallProtocol {
    callables: RwLock<HashMap<String, DirectCallable>>,
}

impl DirectCallProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async callable under `name`, replacing any previous one.
    pub fn register_callable<F, Fut>(&self, name: impl Into<String>, callable: F)
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UtcpResult<Value>> + Send + 'static,
    {
        let name = name.into();
        debug!(callable = %name, "registered direct callable");
        self.callables
            .write()
            .expect("callable table lock poisoned")
            .insert(name, Arc::new(move |args| Box::pin(callable(args))));
    }

    fn template<'a>(template: &'a CallTemplate) -> UtcpResult<&'a DirectCallTemplate> {
        match template {
            CallTemplate::DirectCall(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "direct-call protocol received a '{}' template",
                other.kind()
            ))),
        }
    }

    fn callable(&self, name: &str, context: &str) -> UtcpResult<DirectCallable> {
        self.callables
            .read()
            .expect("callable table lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| {
                UtcpError::call_failed(context, format!("no callable registered as '{name}'"))
            })
    }
}

#[async_trait]
impl CommunicationProtocol for DirectCallProtocol {
    /// Invoke the named callable with no arguments and parse its result as
    /// a UTCP manual.
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let direct = Self::template(template)?;
        let context = direct.name.as_deref().unwrap_or("direct manual");

        let outcome = async {
            let callable = self.callable(&direct.callable_name, context)?;
            let value = (*callable)(JsonObject::new()).await?;
            serde_json::from_value::<UtcpManual>(value).map_err(|e| {
                UtcpError::call_failed(context, format!("callable did not return a manual: {e}"))
            })
        }
        .await;

        match outcome {
            Ok(manual) => Ok(RegisterManualResult::ok(template.clone(), manual)),
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

    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value> {
        let direct = Self::template(template)?;
        let callable = self.callable(&direct.callable_name, tool_name)?;
        (*callable)(args.clone()).await
    }

    async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        let result = self.call_tool(tool_name, args, template).await?;
        Ok(Box::pin(stream::iter([Ok::<_, UtcpError>(result)])))
    }

    async fn close(&self) -> UtcpResult<()> {
        self.callables
            .write()
            .expect("callable table lock poisoned")
            .clear();
        Ok(())
    }
}
