//! Client configuration document.
//!
//! The configuration is plain JSON. Pluggable sections (variable loaders,
//! repository, search strategy, post-processors) are tagged unions; unknown
//! kinds survive parsing and are resolved against the factory registries
//! when the client materializes them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tagged::tagged_union;
use crate::types::call_template::CallTemplate;

/// Default per-request timeout for HTTP-family protocols, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration of the dotenv variable loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotEnvLoaderConfig {
    /// Path to the key/value file, resolved against the client root dir
    /// when relative.
    pub env_file_path: String,
}

tagged_union! {
    /// Tagged variable-loader configuration, discriminated by
    /// `variable_loader_type`.
    pub enum VariableLoaderConfig, tag = "variable_loader_type" {
        "dotenv" => DotEnv(DotEnvLoaderConfig),
    }
}

/// Configuration of the in-memory repository. No knobs today.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InMemRepositoryConfig {}

tagged_union! {
    /// Tagged repository configuration, discriminated by
    /// `tool_repository_type`.
    pub enum ToolRepositoryConfig, tag = "tool_repository_type" {
        "in_memory" => InMemory(InMemRepositoryConfig),
    }
}

impl Default for ToolRepositoryConfig {
    fn default() -> Self {
        ToolRepositoryConfig::InMemory(InMemRepositoryConfig::default())
    }
}

fn default_tag_weight() -> f64 {
    3.0
}

fn default_description_weight() -> f64 {
    1.0
}

/// Weights for the lexical search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAndDescriptionWordMatchConfig {
    #[serde(default = "default_tag_weight")]
    pub tag_weight: f64,

    #[serde(default = "default_description_weight")]
    pub description_weight: f64,
}

impl Default for TagAndDescriptionWordMatchConfig {
    fn default() -> Self {
        Self {
            tag_weight: default_tag_weight(),
            description_weight: default_description_weight(),
        }
    }
}

tagged_union! {
    /// Tagged search-strategy configuration, discriminated by
    /// `tool_search_strategy_type`.
    pub enum ToolSearchStrategyConfig, tag = "tool_search_strategy_type" {
        "tag_and_description_word_match" =>
            TagAndDescriptionWordMatch(TagAndDescriptionWordMatchConfig),
    }
}

impl Default for ToolSearchStrategyConfig {
    fn default() -> Self {
        ToolSearchStrategyConfig::TagAndDescriptionWordMatch(
            TagAndDescriptionWordMatchConfig::default(),
        )
    }
}

/// Configuration of the dictionary-filtering post-processor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterDictConfig {
    /// Keys removed wherever they appear. Ignored when `only_include_keys`
    /// is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_keys: Option<Vec<String>>,

    /// Keys kept wherever they appear; sub-structures left empty by the
    /// filter are pruned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_keys: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_manuals: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_manuals: Option<Vec<String>>,
}

fn default_string_limit() -> usize {
    10_000
}

/// Configuration of the string-truncating post-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitStringsConfig {
    /// Maximum length, in characters, of any string in the result.
    #[serde(default = "default_string_limit")]
    pub limit: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_tools: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_manuals: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_manuals: Option<Vec<String>>,
}

tagged_union! {
    /// Tagged post-processor configuration, discriminated by
    /// `tool_post_processor_type`.
    pub enum PostProcessorConfig, tag = "tool_post_processor_type" {
        "filter_dict" => FilterDict(FilterDictConfig),
        "limit_strings" => LimitStrings(LimitStringsConfig),
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UtcpClientConfig {
    /// Directly configured variables, highest lookup priority.
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Variable loaders consulted, in order, after `variables`.
    #[serde(default)]
    pub load_variables_from: Vec<VariableLoaderConfig>,

    #[serde(default)]
    pub tool_repository: ToolRepositoryConfig,

    #[serde(default)]
    pub tool_search_strategy: ToolSearchStrategyConfig,

    /// Transforms applied, in order, to every tool result and stream chunk.
    #[serde(default)]
    pub post_processing: Vec<PostProcessorConfig>,

    /// Manuals registered when the client starts.
    #[serde(default)]
    pub manual_call_templates: Vec<CallTemplate>,
}
