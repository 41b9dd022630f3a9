//! Concurrency-safe in-memory tool repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{UtcpError, UtcpResult};
use crate::types::call_template::CallTemplate;
use crate::types::tool::{Tool, UtcpManual};

/// Store mapping manuals to their call templates and tools.
///
/// Every getter returns owned clones so callers can never mutate stored
/// state through a returned value. Implementations must apply each write
/// operation atomically with respect to readers.
#[async_trait]
pub trait ConcurrentToolRepository: Send + Sync {
    /// Store a manual under the template's name, replacing any previous
    /// manual of that name together with its tools.
    async fn save_manual(&self, template: &CallTemplate, manual: &UtcpManual) -> UtcpResult<()>;

    /// Remove a manual and all of its tools. Returns whether it existed.
    async fn remove_manual(&self, manual_name: &str) -> UtcpResult<bool>;

    /// Remove a single tool, also dropping it from its manual's tool list.
    async fn remove_tool(&self, tool_name: &str) -> UtcpResult<bool>;

    async fn get_tool(&self, tool_name: &str) -> UtcpResult<Option<Tool>>;

    async fn get_tools(&self) -> UtcpResult<Vec<Tool>>;

    async fn get_tools_by_manual(&self, manual_name: &str) -> UtcpResult<Option<Vec<Tool>>>;

    async fn get_manual(&self, manual_name: &str) -> UtcpResult<Option<UtcpManual>>;

    async fn get_manuals(&self) -> UtcpResult<Vec<UtcpManual>>;

    async fn get_manual_call_template(
        &self,
        manual_name: &str,
    ) -> UtcpResult<Option<CallTemplate>>;

    async fn get_manual_call_templates(&self) -> UtcpResult<Vec<CallTemplate>>;
}

#[derive(Default)]
struct RepositoryState {
    templates: HashMap<String, CallTemplate>,
    manuals: HashMap<String, UtcpManual>,
    tools: HashMap<String, Tool>,
}

/// The built-in repository: three maps behind one `RwLock`.
///
/// Write methods take the write guard once and never await while holding
/// it, so readers observe either the pre-state or the post-state of a
/// write, never a torn one.
#[derive(Default)]
pub struct InMemToolRepository {
    state: RwLock<RepositoryState>,
}

impl InMemToolRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConcurrentToolRepository for InMemToolRepository {
    async fn save_manual(&self, template: &CallTemplate, manual: &UtcpManual) -> UtcpResult<()> {
        let name = template
            .name()
            .ok_or_else(|| UtcpError::config_invalid("cannot save a manual from an unnamed template"))?
            .to_string();

        let mut state = self.state.write().await;
        if let Some(previous) = state.manuals.remove(&name) {
            for tool in &previous.tools {
                state.tools.remove(&tool.name);
            }
        }
        for tool in &manual.tools {
            state.tools.insert(tool.name.clone(), tool.clone());
        }
        state.templates.insert(name.clone(), template.clone());
        state.manuals.insert(name.clone(), manual.clone());
        debug!(manual = %name, tools = manual.tools.len(), "saved manual");
        Ok(())
    }

    async fn remove_manual(&self, manual_name: &str) -> UtcpResult<bool> {
        let mut state = self.state.write().await;
        let Some(manual) = state.manuals.remove(manual_name) else {
            return Ok(false);
        };
        state.templates.remove(manual_name);
        for tool in &manual.tools {
            state.tools.remove(&tool.name);
        }
        debug!(manual = %manual_name, "removed manual");
        Ok(true)
    }

    async fn remove_tool(&self, tool_name: &str) -> UtcpResult<bool> {
        let mut state = self.state.write().await;
        if state.tools.remove(tool_name).is_none() {
            return Ok(false);
        }
        if let Some((manual_name, _)) = tool_name.split_once('.') {
            if let Some(manual) = state.manuals.get_mut(manual_name) {
                manual.tools.retain(|t| t.name != tool_name);
            }
        }
        Ok(true)
    }

    async fn get_tool(&self, tool_name: &str) -> UtcpResult<Option<Tool>> {
        Ok(self.state.read().await.tools.get(tool_name).cloned())
    }

    async fn get_tools(&self) -> UtcpResult<Vec<Tool>> {
        Ok(self.state.read().await.tools.values().cloned().collect())
    }

    async fn get_tools_by_manual(&self, manual_name: &str) -> UtcpResult<Option<Vec<Tool>>> {
        Ok(self
            .state
            .read()
            .await
            .manuals
            .get(manual_name)
            .map(|m| m.tools.clone()))
    }

    async fn get_manual(&self, manual_name: &str) -> UtcpResult<Option<UtcpManual>> {
        Ok(self.state.read().await.manuals.get(manual_name).cloned())
    }

    async fn get_manuals(&self) -> UtcpResult<Vec<UtcpManual>> {
        Ok(self.state.read().await.manuals.values().cloned().collect())
    }

    async fn get_manual_call_template(
        &self,
        manual_name: &str,
    ) -> UtcpResult<Option<CallTemplate>> {
        Ok(self.state.read().await.templates.get(manual_name).cloned())
    }

    async fn get_manual_call_templates(&self) -> UtcpResult<Vec<CallTemplate>> {
        Ok(self.state.read().await.templates.values().cloned().collect())
    }
}
