//! Mapping tool arguments onto an HTTP request.
//!
//! Inputs listed in `header_fields` become headers, the input named by
//! `body_field` becomes the body, `{placeholder}` segments in the URL are
//! filled from inputs and removed, and whatever remains is sent as query
//! parameters.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::types::JsonObject;

lazy_static! {
    static ref PATH_PARAM: Regex = Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap();
}

/// String form of a scalar argument for headers, paths, and queries.
pub(crate) fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill `{name}` placeholders from `args`, removing each used input.
pub(crate) fn render_path_params(
    url: &str,
    args: &mut JsonObject,
    tool_name: &str,
) -> UtcpResult<String> {
    let mut rendered = url.to_string();
    for caps in PATH_PARAM.captures_iter(url) {
        let name = &caps[1];
        let value = args.remove(name).ok_or_else(|| {
            UtcpError::call_failed(tool_name, format!("missing path parameter '{name}'"))
        })?;
        rendered = rendered.replace(&format!("{{{name}}}"), &scalar_string(&value));
    }
    Ok(rendered)
}

/// Distribute the remaining inputs over headers, body, and query.
pub(crate) fn map_arguments(
    mut request: reqwest::RequestBuilder,
    mut args: JsonObject,
    body_field: Option<&str>,
    header_fields: Option<&[String]>,
    content_type: &str,
) -> reqwest::RequestBuilder {
    if let Some(fields) = header_fields {
        for field in fields {
            if let Some(value) = args.remove(field) {
                request = request.header(field.as_str(), scalar_string(&value));
            }
        }
    }
    if let Some(field) = body_field {
        if let Some(body) = args.remove(field) {
            request = if content_type.contains("json") {
                request.json(&body)
            } else {
                request.body(scalar_string(&body))
            };
        }
    }
    for (key, value) in &args {
        request = request.query(&[(key.as_str(), scalar_string(value))]);
    }
    request
}
