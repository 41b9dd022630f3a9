//! Built-in plugin installation.
//!
//! Runs exactly once per process, before any factory lookup. Built-ins
//! register without override, so a plugin that registered earlier under
//! the same kind wins and keeps its slot.

use std::sync::Arc;
use std::sync::Once;

use utcp_core::config::{
    DotEnvLoaderConfig, FilterDictConfig, LimitStringsConfig, TagAndDescriptionWordMatchConfig,
};
use utcp_core::postprocess::{FilterDictPostProcessor, LimitStringsPostProcessor};
use utcp_core::registry::{
    POST_PROCESSOR_FACTORIES, PROTOCOL_FACTORIES, REPOSITORY_FACTORIES,
    SEARCH_STRATEGY_FACTORIES, VARIABLE_LOADER_FACTORIES,
};
use utcp_core::repository::InMemToolRepository;
use utcp_core::search::TagAndDescriptionWordMatchStrategy;
use utcp_core::variables::loader::DotEnvLoader;
use utcp_cli::CliProtocol;
use utcp_http::{HttpProtocol, SseProtocol, StreamableHttpProtocol};

use crate::direct::DirectCallProtocol;
use crate::text::TextProtocol;

static INIT: Once = Once::new();

/// Install every built-in kind. Safe to call from anywhere, any number of
/// times.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        PROTOCOL_FACTORIES.register(
            "http",
            Arc::new(|| Ok(Arc::new(HttpProtocol::new()?) as _)),
            false,
        );
        PROTOCOL_FACTORIES.register(
            "streamable_http",
            Arc::new(|| Ok(Arc::new(StreamableHttpProtocol::new()?) as _)),
            false,
        );
        PROTOCOL_FACTORIES.register(
            "sse",
            Arc::new(|| Ok(Arc::new(SseProtocol::new()?) as _)),
            false,
        );
        PROTOCOL_FACTORIES.register(
            "cli",
            Arc::new(|| Ok(Arc::new(CliProtocol::new()) as _)),
            false,
        );
        // The client swaps these two for instances bound to its root dir
        // and callable table; the factories keep the kinds resolvable for
        // standalone dispatcher users.
        PROTOCOL_FACTORIES.register(
            "text",
            Arc::new(|| Ok(Arc::new(TextProtocol::new(".")) as _)),
            false,
        );
        PROTOCOL_FACTORIES.register(
            "direct-call",
            Arc::new(|| Ok(Arc::new(DirectCallProtocol::new()) as _)),
            false,
        );

        REPOSITORY_FACTORIES.register(
            "in_memory",
            Arc::new(|_config| Ok(Arc::new(InMemToolRepository::new()) as _)),
            false,
        );

        SEARCH_STRATEGY_FACTORIES.register(
            "tag_and_description_word_match",
            Arc::new(|config| {
                let parsed: TagAndDescriptionWordMatchConfig =
                    serde_json::from_value(config.clone())?;
                Ok(Arc::new(TagAndDescriptionWordMatchStrategy::from_config(&parsed)) as _)
            }),
            false,
        );

        POST_PROCESSOR_FACTORIES.register(
            "filter_dict",
            Arc::new(|config| {
                let parsed: FilterDictConfig = serde_json::from_value(config.clone())?;
                Ok(Arc::new(FilterDictPostProcessor::new(parsed)) as _)
            }),
            false,
        );
        POST_PROCESSOR_FACTORIES.register(
            "limit_strings",
            Arc::new(|config| {
                let parsed: LimitStringsConfig = serde_json::from_value(config.clone())?;
                Ok(Arc::new(LimitStringsPostProcessor::new(parsed)) as _)
            }),
            false,
        );

        VARIABLE_LOADER_FACTORIES.register(
            "dotenv",
            Arc::new(|config, root_dir| {
                let parsed: DotEnvLoaderConfig = serde_json::from_value(config.clone())?;
                let path = root_dir.join(parsed.env_file_path);
                Ok(Arc::new(DotEnvLoader::new(path)) as _)
            }),
            false,
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_idempotent() {
        ensure_initialized();
        ensure_initialized();
        for kind in ["http", "streamable_http", "sse", "cli", "text", "direct-call"] {
            assert!(PROTOCOL_FACTORIES.contains(kind), "missing protocol {kind}");
        }
        assert!(REPOSITORY_FACTORIES.contains("in_memory"));
        assert!(SEARCH_STRATEGY_FACTORIES.contains("tag_and_description_word_match"));
        assert!(POST_PROCESSOR_FACTORIES.contains("filter_dict"));
        assert!(POST_PROCESSOR_FACTORIES.contains("limit_strings"));
        assert!(VARIABLE_LOADER_FACTORIES.contains("dotenv"));
    }
}
