//! Result post-processing pipeline.
//!
//! Post-processors transform every tool result and every stream chunk, in
//! configured order. Both built-ins can be gated to specific tools or
//! manuals through allow/deny lists; an empty result is still a result and
//! is passed through, because stream consumers may rely on chunk
//! boundaries.

use serde_json::Value;

use crate::config::{FilterDictConfig, LimitStringsConfig};
use crate::error::UtcpResult;

/// A transform applied to tool results and stream chunks.
pub trait ToolPostProcessor: Send + Sync {
    fn post_process(
        &self,
        manual_name: &str,
        tool_name: &str,
        result: Value,
    ) -> UtcpResult<Value>;
}

fn gated_out(
    name: &str,
    only_include: &Option<Vec<String>>,
    exclude: &Option<Vec<String>>,
) -> bool {
    if let Some(only) = only_include {
        if !only.iter().any(|n| n == name) {
            return true;
        }
    }
    if let Some(excluded) = exclude {
        if excluded.iter().any(|n| n == name) {
            return true;
        }
    }
    false
}

/// Removes or keeps dictionary keys across the whole result tree.
pub struct FilterDictPostProcessor {
    config: FilterDictConfig,
}

impl FilterDictPostProcessor {
    pub fn new(config: FilterDictConfig) -> Self {
        Self { config }
    }

    fn applies_to(&self, manual_name: &str, tool_name: &str) -> bool {
        !gated_out(
            tool_name,
            &self.config.only_include_tools,
            &self.config.exclude_tools,
        ) && !gated_out(
            manual_name,
            &self.config.only_include_manuals,
            &self.config.exclude_manuals,
        )
    }

    /// Keep only `include` keys; sub-structures emptied by the filter are
    /// pruned. Scalars survive only underneath an included key.
    fn include_filter(value: &Value, include: &[String]) -> Option<Value> {
        match value {
            Value::Object(map) => {
                let mut kept = serde_json::Map::new();
                for (key, child) in map {
                    if include.iter().any(|k| k == key) {
                        kept.insert(key.clone(), child.clone());
                    } else if let Some(filtered) = Self::include_filter(child, include) {
                        kept.insert(key.clone(), filtered);
                    }
                }
                if kept.is_empty() {
                    None
                } else {
                    Some(Value::Object(kept))
                }
            }
            Value::Array(items) => {
                let kept: Vec<Value> = items
                    .iter()
                    .filter_map(|item| Self::include_filter(item, include))
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(Value::Array(kept))
                }
            }
            _ => None,
        }
    }

    fn exclude_filter(value: &Value, exclude: &[String]) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !exclude.iter().any(|k| k == *key))
                    .map(|(key, child)| (key.clone(), Self::exclude_filter(child, exclude)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Self::exclude_filter(item, exclude))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl ToolPostProcessor for FilterDictPostProcessor {
    fn post_process(
        &self,
        manual_name: &str,
        tool_name: &str,
        result: Value,
    ) -> UtcpResult<Value> {
        if !self.applies_to(manual_name, tool_name) {
            return Ok(result);
        }
        // Inclusion wins when both sets are configured.
        if let Some(include) = &self.config.only_include_keys {
            return Ok(Self::include_filter(&result, include)
                .unwrap_or(Value::Object(serde_json::Map::new())));
        }
        if let Some(exclude) = &self.config.exclude_keys {
            return Ok(Self::exclude_filter(&result, exclude));
        }
        Ok(result)
    }
}

/// Truncates every string in the result to a maximum length.
pub struct LimitStringsPostProcessor {
    config: LimitStringsConfig,
}

impl LimitStringsPostProcessor {
    pub fn new(config: LimitStringsConfig) -> Self {
        Self { config }
    }

    fn applies_to(&self, manual_name: &str, tool_name: &str) -> bool {
        !gated_out(
            tool_name,
            &self.config.only_include_tools,
            &self.config.exclude_tools,
        ) && !gated_out(
            manual_name,
            &self.config.only_include_manuals,
            &self.config.exclude_manuals,
        )
    }

    fn truncate(value: &Value, limit: usize) -> Value {
        match value {
            Value::String(s) => {
                if s.chars().count() <= limit {
                    Value::String(s.clone())
                } else {
                    Value::String(s.chars().take(limit).collect())
                }
            }
            Value::Array(items) => Value::Array(
                items.iter().map(|item| Self::truncate(item, limit)).collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), Self::truncate(child, limit)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl ToolPostProcessor for LimitStringsPostProcessor {
    fn post_process(
        &self,
        manual_name: &str,
        tool_name: &str,
        result: Value,
    ) -> UtcpResult<Value> {
        if !self.applies_to(manual_name, tool_name) {
            return Ok(result);
        }
        Ok(Self::truncate(&result, self.config.limit))
    }
}
