//! Plugin registries for every extension point.
//!
//! Each registry is a string-keyed factory table. Built-ins are installed
//! by the client crate's bootstrap exactly once; optional plugins may
//! register at load time, before or after bootstrap. Registration is
//! first-wins unless the caller passes `override_existing`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use serde_json::Value;
use tracing::debug;

use crate::error::{UtcpError, UtcpResult};
use crate::postprocess::ToolPostProcessor;
use crate::protocol::CommunicationProtocol;
use crate::repository::ConcurrentToolRepository;
use crate::search::ToolSearchStrategy;
use crate::variables::loader::VariableLoader;

/// A string-keyed table of plug-in values.
pub struct Registry<T> {
    point: &'static str,
    entries: RwLock<HashMap<String, T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new(point: &'static str) -> Self {
        Self {
            point,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register `value` under `kind`. Without `override_existing`, a second
    /// registration of the same kind is ignored and `false` is returned.
    pub fn register(&self, kind: impl Into<String>, value: T, override_existing: bool) -> bool {
        let kind = kind.into();
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if !override_existing && entries.contains_key(&kind) {
            return false;
        }
        debug!(point = self.point, kind = %kind, "registered plugin");
        entries.insert(kind, value);
        true
    }

    pub fn get(&self, kind: &str) -> UtcpResult<T> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(kind)
            .cloned()
            .ok_or_else(|| UtcpError::unknown_kind(kind, self.point))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// Builds a fresh protocol instance for one client.
///
/// Factories rather than shared instances: closing one client must not
/// drain another client's token caches or subprocesses.
pub type ProtocolFactory =
    Arc<dyn Fn() -> UtcpResult<Arc<dyn CommunicationProtocol>> + Send + Sync>;

/// Builds a repository from its tagged config document.
pub type RepositoryFactory =
    Arc<dyn Fn(&Value) -> UtcpResult<Arc<dyn ConcurrentToolRepository>> + Send + Sync>;

/// Builds a search strategy from its tagged config document.
pub type SearchStrategyFactory =
    Arc<dyn Fn(&Value) -> UtcpResult<Arc<dyn ToolSearchStrategy>> + Send + Sync>;

/// Builds a post-processor from its tagged config document.
pub type PostProcessorFactory =
    Arc<dyn Fn(&Value) -> UtcpResult<Arc<dyn ToolPostProcessor>> + Send + Sync>;

/// Builds a variable loader from its tagged config document. The second
/// argument is the client root dir for resolving relative paths.
pub type VariableLoaderFactory =
    Arc<dyn Fn(&Value, &std::path::Path) -> UtcpResult<Arc<dyn VariableLoader>> + Send + Sync>;

lazy_static! {
    pub static ref PROTOCOL_FACTORIES: Registry<ProtocolFactory> =
        Registry::new("communication_protocol");
    pub static ref REPOSITORY_FACTORIES: Registry<RepositoryFactory> =
        Registry::new("tool_repository");
    pub static ref SEARCH_STRATEGY_FACTORIES: Registry<SearchStrategyFactory> =
        Registry::new("tool_search_strategy");
    pub static ref POST_PROCESSOR_FACTORIES: Registry<PostProcessorFactory> =
        Registry::new("post_processor");
    pub static ref VARIABLE_LOADER_FACTORIES: Registry<VariableLoaderFactory> =
        Registry::new("variable_loader");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let registry: Registry<u32> = Registry::new("test_point");
        assert!(registry.register("a", 1, false));
        assert!(!registry.register("a", 2, false));
        assert_eq!(registry.get("a").unwrap(), 1);
    }

    #[test]
    fn test_override_replaces() {
        let registry: Registry<u32> = Registry::new("test_point");
        assert!(registry.register("a", 1, false));
        assert!(registry.register("a", 2, true));
        assert_eq!(registry.get("a").unwrap(), 2);
    }

    #[test]
    fn test_unknown_kind_error_names_the_point() {
        let registry: Registry<u32> = Registry::new("test_point");
        let err = registry.get("missing").unwrap_err();
        assert_eq!(err.to_string(), "Unknown test_point kind: missing");
    }
}
