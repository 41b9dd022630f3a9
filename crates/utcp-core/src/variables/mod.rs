//! Namespaced variable substitution.
//!
//! Configuration trees may reference secrets as `${NAME}` or `$NAME`. Before
//! a template reaches its protocol, every reference is resolved through the
//! manual's namespace: underscores in the namespace are doubled and the
//! effective key becomes `<namespace>_<NAME>`. Manual `github_api` asking
//! for `${TOKEN}` therefore reads `github__api_TOKEN`, and no manual can
//! observe another manual's variables.
//!
//! Lookups go to the config's `variables` map first, then each configured
//! loader in order, then the process environment. A miss is always an error;
//! the substitutor never inserts an empty string.

pub mod loader;

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{UtcpError, UtcpResult};
use crate::types::call_template::CallTemplate;
use self::loader::VariableLoader;

lazy_static! {
    /// Both reference forms: `${NAME}` (group 1) and `$NAME` (group 2).
    static ref VARIABLE_REFERENCE: Regex =
        Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").unwrap();
    static ref VALID_NAMESPACE: Regex = Regex::new(r"^[A-Za-z0-9_]*$").unwrap();
}

/// The variable sources available to one client instance.
#[derive(Clone, Default)]
pub struct VariableResolver {
    pub variables: HashMap<String, String>,
    pub loaders: Vec<Arc<dyn VariableLoader>>,
}

impl VariableResolver {
    /// Resolve one effective key through the priority chain.
    pub async fn resolve(&self, key: &str) -> UtcpResult<String> {
        if let Some(value) = self.variables.get(key) {
            return Ok(value.clone());
        }
        for loader in &self.loaders {
            if let Some(value) = loader.get(key).await {
                return Ok(value);
            }
        }
        std::env::var(key).map_err(|_| UtcpError::VariableNotFound(key.to_string()))
    }
}

/// Turn a `${NAME}` reference into its effective key under `namespace`.
pub fn effective_key(namespace: Option<&str>, name: &str) -> UtcpResult<String> {
    match namespace {
        Some(ns) => {
            if !VALID_NAMESPACE.is_match(ns) {
                return Err(UtcpError::config_invalid(format!(
                    "namespace '{ns}' contains characters outside [A-Za-z0-9_]"
                )));
            }
            Ok(format!("{}_{}", ns.replace('_', "__"), name))
        }
        None => Ok(name.to_string()),
    }
}

/// Walk `value` and collect the effective keys it references, in
/// first-occurrence order and without duplicates.
pub fn find_required_variables(
    value: &Value,
    namespace: Option<&str>,
) -> UtcpResult<Vec<String>> {
    let mut keys = Vec::new();
    collect_references(value, namespace, &mut keys)?;
    Ok(keys)
}

fn collect_references(
    value: &Value,
    namespace: Option<&str>,
    keys: &mut Vec<String>,
) -> UtcpResult<()> {
    match value {
        Value::String(s) => {
            for caps in VARIABLE_REFERENCE.captures_iter(s) {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let key = effective_key(namespace, name)?;
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, namespace, keys)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_references(item, namespace, keys)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Substitute every variable reference in `value`.
///
/// Resolution happens up front so the replacement walk itself is pure; a
/// single missing key fails the whole substitution with `VariableNotFound`.
pub async fn substitute_value(
    value: &Value,
    resolver: &VariableResolver,
    namespace: Option<&str>,
) -> UtcpResult<Value> {
    let required = find_required_variables(value, namespace)?;
    let mut resolved = HashMap::with_capacity(required.len());
    for key in required {
        let val = resolver.resolve(&key).await?;
        resolved.insert(key, val);
    }
    Ok(replace_references(value, namespace, &resolved))
}

fn replace_references(
    value: &Value,
    namespace: Option<&str>,
    resolved: &HashMap<String, String>,
) -> Value {
    match value {
        Value::String(s) => {
            let replaced = VARIABLE_REFERENCE.replace_all(s, |caps: &regex::Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                // effective_key already validated during discovery
                let key = effective_key(namespace, name).unwrap_or_default();
                resolved.get(&key).cloned().unwrap_or_default()
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_references(item, namespace, resolved))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_references(v, namespace, resolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitute variables across a call template, namespace-scoped.
///
/// The template round-trips through its JSON form so every string field is
/// covered, including fields of plugin templates this crate cannot name.
pub async fn substitute_call_template(
    template: &CallTemplate,
    resolver: &VariableResolver,
    namespace: Option<&str>,
) -> UtcpResult<CallTemplate> {
    let value = serde_json::to_value(template)?;
    let substituted = substitute_value(&value, resolver, namespace).await?;
    Ok(serde_json::from_value(substituted)?)
}
