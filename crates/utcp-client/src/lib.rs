//! # UTCP Client
//!
//! The client facade of the UTCP runtime. `UtcpClient` bootstraps the
//! plugin registries, materializes the repository, search strategy,
//! post-processors, and variable loaders from configuration, registers the
//! configured manuals in parallel, and then serves tool calls until
//! `close()` tears every protocol down.
//!
//! ## Example
//!
//! ```no_run
//! use utcp_client::UtcpClient;
//! use utcp_core::config::UtcpClientConfig;
//!
//! # async fn run() -> utcp_core::error::UtcpResult<()> {
//! let config: UtcpClientConfig = serde_json::from_str(
//!     r#"{
//!         "variables": {"weather__api_KEY": "demo"},
//!         "manual_call_templates": [{
//!             "call_template_type": "http",
//!             "name": "weather_api",
//!             "url": "https://api.weather.test/utcp"
//!         }]
//!     }"#,
//! )?;
//! let client = UtcpClient::create(".", config).await?;
//! let result = client
//!     .call_tool("weather_api.get_forecast", &serde_json::Map::new())
//!     .await?;
//! println!("{result}");
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use utcp_core::config::UtcpClientConfig;
use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::postprocess::ToolPostProcessor;
use utcp_core::protocol::{ProtocolDispatcher, RegisterManualResult, ToolStream};
use utcp_core::registry::{
    POST_PROCESSOR_FACTORIES, PROTOCOL_FACTORIES, REPOSITORY_FACTORIES,
    SEARCH_STRATEGY_FACTORIES, VARIABLE_LOADER_FACTORIES,
};
use utcp_core::repository::ConcurrentToolRepository;
use utcp_core::search::ToolSearchStrategy;
use utcp_core::types::call_template::CallTemplate;
use utcp_core::types::tool::Tool;
use utcp_core::types::JsonObject;
use utcp_core::variables::{
    find_required_variables, substitute_call_template, substitute_value, VariableResolver,
};

pub mod bootstrap;
pub mod direct;
pub mod text;

pub use direct::{DirectCallProtocol, DirectCallable};
pub use text::TextProtocol;

/// Replace everything outside `[A-Za-z0-9_]` so manual names are safe as
/// variable namespaces and name prefixes.
fn sanitize_manual_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn fresh_manual_name() -> String {
    format!("manual_{}", Uuid::new_v4().simple())
}

/// The UTCP client: discovery, invocation, search, and teardown behind one
/// handle.
pub struct UtcpClient {
    root_dir: PathBuf,
    repository: Arc<dyn ConcurrentToolRepository>,
    search_strategy: Arc<dyn ToolSearchStrategy>,
    post_processors: Vec<Arc<dyn ToolPostProcessor>>,
    resolver: VariableResolver,
    dispatcher: ProtocolDispatcher,
    direct: Arc<DirectCallProtocol>,
}

impl UtcpClient {
    /// Build a client from configuration and register its initial manuals.
    ///
    /// `root_dir` anchors relative paths in the config (dotenv files, text
    /// manuals). The config's own `variables` values are substituted here
    /// with an empty variables scope, so a key can never resolve through
    /// itself or a sibling key.
    pub async fn create(
        root_dir: impl Into<PathBuf>,
        config: UtcpClientConfig,
    ) -> UtcpResult<Self> {
        bootstrap::ensure_initialized();
        let root_dir = root_dir.into();

        let mut loaders = Vec::new();
        for loader_config in &config.load_variables_from {
            let document = serde_json::to_value(loader_config)?;
            let factory = VARIABLE_LOADER_FACTORIES.get(loader_config.kind())?;
            loaders.push((*factory)(&document, &root_dir)?);
        }

        let seed_resolver = VariableResolver {
            variables: HashMap::new(),
            loaders: loaders.clone(),
        };
        let mut variables = HashMap::with_capacity(config.variables.len());
        for (key, raw) in &config.variables {
            let substituted =
                substitute_value(&Value::String(raw.clone()), &seed_resolver, None).await?;
            let Value::String(value) = substituted else {
                unreachable!("substituting a string yields a string");
            };
            variables.insert(key.clone(), value);
        }
        let resolver = VariableResolver { variables, loaders };

        let repository_document = serde_json::to_value(&config.tool_repository)?;
        let repository_factory = REPOSITORY_FACTORIES.get(config.tool_repository.kind())?;
        let repository = (*repository_factory)(&repository_document)?;

        let strategy_document = serde_json::to_value(&config.tool_search_strategy)?;
        let strategy_factory =
            SEARCH_STRATEGY_FACTORIES.get(config.tool_search_strategy.kind())?;
        let search_strategy = (*strategy_factory)(&strategy_document)?;

        let mut post_processors = Vec::with_capacity(config.post_processing.len());
        for processor_config in &config.post_processing {
            let document = serde_json::to_value(processor_config)?;
            let factory = POST_PROCESSOR_FACTORIES.get(processor_config.kind())?;
            post_processors.push((*factory)(&document)?);
        }

        let mut dispatcher = ProtocolDispatcher::new();
        for kind in PROTOCOL_FACTORIES.kinds() {
            let factory = PROTOCOL_FACTORIES.get(&kind)?;
            dispatcher.insert(kind, (*factory)()?);
        }
        // These two carry per-client state: the root dir for relative
        // manual paths and the callable table.
        let direct = Arc::new(DirectCallProtocol::new());
        dispatcher.insert("direct-call", Arc::clone(&direct) as _);
        dispatcher.insert("text", Arc::new(TextProtocol::new(root_dir.clone())) as _);

        let client = Self {
            root_dir,
            repository,
            search_strategy,
            post_processors,
            resolver,
            dispatcher,
            direct,
        };

        let initial = config.manual_call_templates.clone();
        if !initial.is_empty() {
            let results = client.register_manuals(initial).await;
            let failed = results.iter().filter(|r| !r.success).count();
            info!(
                manuals = results.len(),
                failed,
                "initial manual registration finished"
            );
        }
        Ok(client)
    }

    /// Build a client from a JSON config file; the file's directory becomes
    /// the root dir.
    pub async fn create_from_file(path: impl AsRef<Path>) -> UtcpResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let config: UtcpClientConfig = serde_json::from_str(&contents)
            .map_err(|e| UtcpError::config_invalid(format!("{}: {e}", path.display())))?;
        let root_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::create(root_dir, config).await
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Register a process-local callable for `direct-call` templates.
    pub fn register_callable<F, Fut>(&self, name: impl Into<String>, callable: F)
    where
        F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = UtcpResult<Value>> + Send + 'static,
    {
        self.direct.register_callable(name, callable);
    }

    /// Register one manual.
    ///
    /// Unnamed templates get a fresh unique name; names are sanitized to
    /// word characters. A transport-level failure is reported through the
    /// returned result's `success` flag without touching the repository,
    /// while configuration problems (unknown kind, duplicate name, missing
    /// variable) are hard errors.
    pub async fn register_manual(
        &self,
        template: CallTemplate,
    ) -> UtcpResult<RegisterManualResult> {
        let mut template = template;
        let name = match template.name() {
            Some(name) if !name.is_empty() => sanitize_manual_name(name),
            _ => fresh_manual_name(),
        };
        template.set_name(name.clone());

        if self.repository.get_manual(&name).await?.is_some() {
            return Err(UtcpError::NameConflict(name));
        }

        let substituted =
            substitute_call_template(&template, &self.resolver, Some(&name)).await?;
        let protocol = self.dispatcher.for_template(&substituted)?;
        let mut result = protocol.register_manual(&substituted).await?;

        if !result.success {
            warn!(manual = %name, errors = ?result.errors, "manual registration failed");
            result.manual_call_template = template;
            return Ok(result);
        }

        for tool in &mut result.manual.tools {
            let prefix = format!("{name}.");
            if !tool.name.starts_with(&prefix) {
                tool.name = format!("{prefix}{}", tool.name);
            }
        }

        // Store the unsubstituted template; tool calls re-substitute so
        // rotated credentials are picked up.
        self.repository.save_manual(&template, &result.manual).await?;
        debug!(manual = %name, tools = result.manual.tools.len(), "manual registered");
        result.manual_call_template = template;
        Ok(result)
    }

    /// Register a batch in parallel. Results come back in input order and
    /// per-manual failures (hard or soft) are isolated into their slot.
    pub async fn register_manuals(
        &self,
        templates: Vec<CallTemplate>,
    ) -> Vec<RegisterManualResult> {
        let registrations = templates.into_iter().map(|template| async move {
            match self.register_manual(template.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "manual registration failed");
                    RegisterManualResult::failed(template, vec![e.to_string()])
                }
            }
        });
        join_all(registrations).await
    }

    /// Remove a manual, telling its protocol to release any resources tied
    /// to it first.
    pub async fn deregister_manual(&self, manual_name: &str) -> UtcpResult<bool> {
        let Some(template) = self.repository.get_manual_call_template(manual_name).await? else {
            return Ok(false);
        };
        let protocol = self.dispatcher.for_template(&template)?;
        protocol.deregister_manual(&template).await?;
        self.repository.remove_manual(manual_name).await
    }

    fn split_tool_name<'a>(&self, tool_name: &'a str) -> UtcpResult<&'a str> {
        tool_name
            .split_once('.')
            .map(|(manual, _)| manual)
            .ok_or_else(|| {
                UtcpError::config_invalid(format!(
                    "tool name '{tool_name}' must be '<manual>.<tool>'"
                ))
            })
    }

    async fn tool_dispatch(
        &self,
        tool_name: &str,
    ) -> UtcpResult<(String, CallTemplate)> {
        let manual_name = self.split_tool_name(tool_name)?.to_string();
        let tool = self
            .repository
            .get_tool(tool_name)
            .await?
            .ok_or_else(|| UtcpError::call_failed(tool_name, "tool not registered"))?;
        // Re-substitute at call time; credentials may have rotated since
        // registration.
        let template = substitute_call_template(
            &tool.tool_call_template,
            &self.resolver,
            Some(&manual_name),
        )
        .await?;
        Ok((manual_name, template))
    }

    fn post_process(
        &self,
        manual_name: &str,
        tool_name: &str,
        mut value: Value,
    ) -> UtcpResult<Value> {
        for processor in &self.post_processors {
            value = processor.post_process(manual_name, tool_name, value)?;
        }
        Ok(value)
    }

    /// Call a registered tool and post-process its result.
    pub async fn call_tool(&self, tool_name: &str, args: &JsonObject) -> UtcpResult<Value> {
        let (manual_name, template) = self.tool_dispatch(tool_name).await?;
        let protocol = self.dispatcher.for_template(&template)?;
        let result = protocol.call_tool(tool_name, args, &template).await?;
        self.post_process(&manual_name, tool_name, result)
    }

    /// Call a registered tool as a stream; every chunk passes through the
    /// post-processor chain before it reaches the caller.
    pub async fn call_tool_streaming(
        &self,
        tool_name: &str,
        args: &JsonObject,
    ) -> UtcpResult<ToolStream> {
        let (manual_name, template) = self.tool_dispatch(tool_name).await?;
        let protocol = self.dispatcher.for_template(&template)?;
        let stream = protocol
            .call_tool_streaming(tool_name, args, &template)
            .await?;

        let processors = self.post_processors.clone();
        let tool_name = tool_name.to_string();
        let processed = stream.map(move |chunk| {
            let mut value = chunk?;
            for processor in &processors {
                value = processor.post_process(&manual_name, &tool_name, value)?;
            }
            Ok(value)
        });
        Ok(Box::pin(processed))
    }

    /// Rank registered tools against a query. `limit` of 0 means all
    /// matches; `any_of_tags_required` keeps only tools carrying at least
    /// one of the listed tags.
    pub async fn search_tools(
        &self,
        query: &str,
        limit: usize,
        any_of_tags_required: Option<&[String]>,
    ) -> UtcpResult<Vec<Tool>> {
        self.search_strategy
            .search_tools(self.repository.as_ref(), query, limit, any_of_tags_required)
            .await
    }

    pub async fn get_tools(&self) -> UtcpResult<Vec<Tool>> {
        self.repository.get_tools().await
    }

    /// Effective variable keys a template (and the tools it would
    /// register) depends on. Lets operators pre-check an environment.
    pub fn get_required_variables_for_manual_and_tools(
        &self,
        template: &CallTemplate,
    ) -> UtcpResult<Vec<String>> {
        let namespace = template
            .name()
            .map(sanitize_manual_name)
            .unwrap_or_default();
        let document = serde_json::to_value(template)?;
        find_required_variables(&document, Some(&namespace))
    }

    /// Effective variable keys a registered tool's call template depends
    /// on.
    pub async fn get_required_variables_for_registered_tool(
        &self,
        tool_name: &str,
    ) -> UtcpResult<Vec<String>> {
        let manual_name = self.split_tool_name(tool_name)?.to_string();
        let tool = self
            .repository
            .get_tool(tool_name)
            .await?
            .ok_or_else(|| UtcpError::call_failed(tool_name, "tool not registered"))?;
        let document = serde_json::to_value(&tool.tool_call_template)?;
        find_required_variables(&document, Some(&manual_name))
    }

    /// Tear down every protocol. Never fails; individual protocol errors
    /// are logged.
    pub async fn close(&self) {
        self.dispatcher.close_all().await;
    }
}
