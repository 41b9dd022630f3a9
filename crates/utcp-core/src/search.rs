//! Lexical tool search.

use async_trait::async_trait;

use crate::config::TagAndDescriptionWordMatchConfig;
use crate::error::UtcpResult;
use crate::repository::ConcurrentToolRepository;
use crate::types::tool::Tool;

/// Ranks repository tools against a free-text query.
#[async_trait]
pub trait ToolSearchStrategy: Send + Sync {
    /// `limit` of 0 means unlimited. When `any_of_tags_required` is set, a
    /// tool must carry at least one of the listed tags to be considered.
    async fn search_tools(
        &self,
        repository: &dyn ConcurrentToolRepository,
        query: &str,
        limit: usize,
        any_of_tags_required: Option<&[String]>,
    ) -> UtcpResult<Vec<Tool>>;
}

/// Weighted word matching over tool names, tags, and descriptions.
pub struct TagAndDescriptionWordMatchStrategy {
    tag_weight: f64,
    description_weight: f64,
}

impl Default for TagAndDescriptionWordMatchStrategy {
    fn default() -> Self {
        Self::from_config(&TagAndDescriptionWordMatchConfig::default())
    }
}

impl TagAndDescriptionWordMatchStrategy {
    pub fn from_config(config: &TagAndDescriptionWordMatchConfig) -> Self {
        Self {
            tag_weight: config.tag_weight,
            description_weight: config.description_weight,
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                current.extend(ch.to_lowercase());
            } else if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }

    fn score(&self, tool: &Tool, query: &str, query_tokens: &[String]) -> f64 {
        let mut score = 0.0;

        let sub_name = tool.local_name().to_lowercase();
        if query == sub_name || query.contains(&sub_name) || sub_name.contains(query) {
            score += 2.0 * self.tag_weight;
        }
        let name_tokens = Self::tokenize(&sub_name);
        for token in query_tokens {
            if name_tokens.contains(token) {
                score += self.tag_weight;
            }
        }

        for tag in &tool.tags {
            let tag_lower = tag.to_lowercase();
            if query.contains(&tag_lower) || tag_lower.contains(query) {
                score += self.tag_weight;
            }
            let tag_tokens = Self::tokenize(&tag_lower);
            for token in query_tokens {
                if tag_tokens.contains(token) {
                    score += 0.5 * self.tag_weight;
                }
            }
        }

        let description_tokens = Self::tokenize(&tool.description);
        for token in query_tokens {
            if token.len() > 2 && description_tokens.contains(token) {
                score += self.description_weight;
            }
        }

        score
    }
}

#[async_trait]
impl ToolSearchStrategy for TagAndDescriptionWordMatchStrategy {
    async fn search_tools(
        &self,
        repository: &dyn ConcurrentToolRepository,
        query: &str,
        limit: usize,
        any_of_tags_required: Option<&[String]>,
    ) -> UtcpResult<Vec<Tool>> {
        let query_lower = query.to_lowercase();
        let query_tokens = Self::tokenize(&query_lower);

        let mut scored: Vec<(f64, Tool)> = Vec::new();
        for tool in repository.get_tools().await? {
            if let Some(required) = any_of_tags_required {
                let has_any = tool.tags.iter().any(|tag| {
                    required
                        .iter()
                        .any(|wanted| wanted.eq_ignore_ascii_case(tag))
                });
                if !has_any {
                    continue;
                }
            }
            let score = self.score(&tool, &query_lower, &query_tokens);
            if score > 0.0 {
                scored.push((score, tool));
            }
        }

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut results: Vec<Tool> = scored.into_iter().map(|(_, tool)| tool).collect();
        if limit > 0 {
            results.truncate(limit);
        }
        Ok(results)
    }
}
