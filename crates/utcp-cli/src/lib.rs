//! # UTCP CLI
//!
//! The `cli` communication protocol: tools backed by local command-line
//! programs. A template's steps are assembled into one shell script (bash
//! on POSIX hosts, PowerShell on Windows) and executed in a single fresh
//! subprocess with captured output, a hard timeout, and no pooling.
//!
//! Streaming is not provided; `call_tool_streaming` fails fast so the
//! facade never tries to adapt a finished result into a stream.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, error};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::protocol::{CommunicationProtocol, RegisterManualResult, ToolStream};
use utcp_core::types::call_template::{CallTemplate, CliCallTemplate};
use utcp_core::types::tool::UtcpManual;
use utcp_core::types::JsonObject;

mod script;

use script::{build_posix_script, build_powershell_script};

/// Timeout for manual discovery runs.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for tool-call runs.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// The `cli` protocol.
#[derive(Default)]
pub struct CliProtocol;

impl CliProtocol {
    pub fn new() -> Self {
        Self
    }

    fn template<'a>(template: &'a CallTemplate) -> UtcpResult<&'a CliCallTemplate> {
        match template {
            CallTemplate::Cli(t) => Ok(t),
            other => Err(UtcpError::config_invalid(format!(
                "cli protocol received a '{}' template",
                other.kind()
            ))),
        }
    }

    async fn execute(
        &self,
        template: &CliCallTemplate,
        args: &JsonObject,
        timeout: Duration,
        context: &str,
    ) -> UtcpResult<String> {
        if template.commands.is_empty() {
            return Err(UtcpError::config_invalid(
                "cli template has no commands".to_string(),
            ));
        }

        let mut command = if cfg!(windows) {
            let script = build_powershell_script(&template.commands, args);
            let mut command = Command::new("powershell.exe");
            command.arg("-NoProfile").arg("-Command").arg(script);
            command
        } else {
            let script = build_posix_script(&template.commands, args);
            let mut command = Command::new("/bin/bash");
            command.arg("-c").arg(script);
            command
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The shell is killed when the timeout drops the wait future.
            .kill_on_drop(true);
        if let Some(env) = &template.env {
            command.envs(env);
        }
        if let Some(dir) = &template.working_dir {
            command.current_dir(dir);
        }

        debug!(context = %context, steps = template.commands.len(), "spawning cli subprocess");
        let child = command.spawn().map_err(|e| {
            UtcpError::call_failed(context, format!("failed to spawn shell: {e}"))
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                error!(context = %context, timeout_secs = timeout.as_secs(), "cli subprocess timed out");
                UtcpError::timeout(context.to_string())
            })?
            .map_err(|e| {
                UtcpError::call_failed(context, format!("failed to read subprocess output: {e}"))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        // The POSIX script echoes explicitly, so stdout is canonical there;
        // PowerShell surfaces failures through stderr.
        let text = if cfg!(windows) && !output.status.success() {
            stderr
        } else {
            stdout
        };
        Ok(text.trim().to_string())
    }

    fn parse_output(text: &str) -> Value {
        if text.starts_with('{') || text.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str(text) {
                return parsed;
            }
        }
        Value::String(text.to_string())
    }
}

#[async_trait]
impl CommunicationProtocol for CliProtocol {
    /// Run the template with no arguments and parse its output as a UTCP
    /// manual.
    async fn register_manual(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let cli = Self::template(template)?;
        let context = cli.name.as_deref().unwrap_or("cli manual");

        let outcome = async {
            let text = self
                .execute(cli, &JsonObject::new(), DISCOVERY_TIMEOUT, context)
                .await?;
            serde_json::from_str::<UtcpManual>(&text).map_err(|e| {
                UtcpError::call_failed(context, format!("output is not a UTCP manual: {e}"))
            })
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
        // Every invocation spawns and reaps its own subprocess.
        Ok(())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        args: &JsonObject,
        template: &CallTemplate,
    ) -> UtcpResult<Value> {
        let cli = Self::template(template)?;
        let text = self.execute(cli, args, CALL_TIMEOUT, tool_name).await?;
        Ok(Self::parse_output(&text))
    }

    async fn call_tool_streaming(
        &self,
        _tool_name: &str,
        _args: &JsonObject,
        _template: &CallTemplate,
    ) -> UtcpResult<ToolStream> {
        Err(UtcpError::StreamingUnsupported("cli".to_string()))
    }

    async fn close(&self) -> UtcpResult<()> {
        Ok(())
    }
}
