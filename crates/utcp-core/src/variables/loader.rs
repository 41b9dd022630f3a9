//! Variable loaders: pluggable secondary sources for `${VAR}` lookups.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// A source of variable values consulted after the config's own `variables`
/// map and before the process environment.
#[async_trait]
pub trait VariableLoader: Send + Sync {
    /// Look up a fully namespaced key, returning `None` on a miss.
    async fn get(&self, key: &str) -> Option<String>;
}

/// Loads `KEY=VALUE` pairs from a dotenv file.
///
/// The file is read once on first lookup and cached for the lifetime of the
/// loader. An unreadable file logs a warning and behaves as empty, so one
/// absent optional file does not take down every other source.
pub struct DotEnvLoader {
    path: PathBuf,
    cache: OnceCell<HashMap<String, String>>,
}

impl DotEnvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn entries(&self) -> &HashMap<String, String> {
        self.cache
            .get_or_init(|| async {
                let path = self.path.clone();
                match dotenvy::from_path_iter(&path) {
                    Ok(iter) => {
                        let map: HashMap<String, String> =
                            iter.filter_map(Result::ok).collect();
                        debug!(path = %path.display(), entries = map.len(), "loaded dotenv file");
                        map
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read dotenv file");
                        HashMap::new()
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl VariableLoader for DotEnvLoader {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries().await.get(key).cloned()
    }
}
