//! OpenAPI to UTCP manual conversion.
//!
//! Every operation with an `operationId` becomes one tool whose call
//! template drives the HTTP protocol. Both OpenAPI 3.x and Swagger 2.0
//! documents are accepted; `$ref` chains are resolved with a visited set so
//! cyclic schemas terminate.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use utcp_core::error::UtcpResult;
use utcp_core::types::auth::{ApiKeyAuth, ApiKeyLocation, Auth, BasicAuth, OAuth2Auth};
use utcp_core::types::call_template::{CallTemplate, HttpCallTemplate, HttpMethod};
use utcp_core::types::tool::{Tool, UtcpManual};

/// Whether a JSON document should be converted rather than parsed as a
/// UTCP manual.
pub fn is_openapi_document(value: &Value) -> bool {
    ["openapi", "swagger", "paths"]
        .iter()
        .any(|key| value.get(key).is_some())
}

/// Converts one OpenAPI document into a UTCP manual.
pub struct OpenApiConverter<'a> {
    document: &'a Value,
    /// URL the document was fetched from, used to derive a base URL when
    /// the document does not name its servers.
    spec_url: Option<&'a str>,
    /// Live credentials supplied by the caller; used for matching security
    /// schemes instead of placeholders.
    auth_tools: Option<&'a Auth>,
    placeholder_counter: u32,
}

impl<'a> OpenApiConverter<'a> {
    pub fn new(document: &'a Value, spec_url: Option<&'a str>, auth_tools: Option<&'a Auth>) -> Self {
        Self {
            document,
            spec_url,
            auth_tools,
            placeholder_counter: 0,
        }
    }

    pub fn convert(mut self) -> UtcpResult<UtcpManual> {
        let mut tools = Vec::new();
        let paths = match self.document.get("paths").and_then(Value::as_object) {
            Some(paths) => paths.clone(),
            None => return Ok(UtcpManual::new(tools)),
        };

        let base_url = self.base_url();
        for (path, item) in &paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            let inherited: Vec<Value> = item
                .get("parameters")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for method in ["get", "post", "put", "delete", "patch"] {
                let Some(operation) = item.get(method).filter(|op| op.is_object()) else {
                    continue;
                };
                if let Some(tool) =
                    self.convert_operation(&base_url, path, method, operation, &inherited)
                {
                    tools.push(tool);
                }
            }
        }
        debug!(tools = tools.len(), "converted OpenAPI document");
        Ok(UtcpManual::new(tools))
    }

    fn convert_operation(
        &mut self,
        base_url: &str,
        path: &str,
        method: &str,
        operation: &Value,
        inherited_params: &[Value],
    ) -> Option<Tool> {
        let Some(operation_id) = operation.get("operationId").and_then(Value::as_str) else {
            warn!(%path, %method, "skipping operation without operationId");
            return None;
        };

        let description = operation
            .get("summary")
            .or_else(|| operation.get("description"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let tags: Vec<String> = operation
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();
        let mut header_fields: Vec<String> = Vec::new();
        let mut body_field = None;

        let own_params: Vec<Value> = operation
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for param in inherited_params.iter().chain(own_params.iter()) {
            let param = self.resolve(param);
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            let location = param.get("in").and_then(Value::as_str).unwrap_or("query");

            if location == "body" {
                // Swagger 2.0 body parameter.
                let schema = self.resolve(param.get("schema").unwrap_or(&Value::Null));
                properties.insert("body".to_string(), schema);
                if param.get("required").and_then(Value::as_bool).unwrap_or(false) {
                    required.push("body".to_string());
                }
                body_field = Some("body".to_string());
                continue;
            }

            let mut schema = match param.get("schema") {
                Some(schema) => self.resolve(schema),
                // Swagger 2.0 keeps the type fields on the parameter itself.
                None => param
                    .get("type")
                    .map(|t| json!({ "type": t }))
                    .unwrap_or_else(|| json!({})),
            };
            if let (Value::Object(map), Some(desc)) = (
                &mut schema,
                param.get("description").and_then(Value::as_str),
            ) {
                map.entry("description")
                    .or_insert_with(|| Value::String(desc.to_string()));
            }
            if location == "path"
                || param.get("required").and_then(Value::as_bool).unwrap_or(false)
            {
                required.push(name.to_string());
            }
            if location == "header" {
                header_fields.push(name.to_string());
            }
            properties.insert(name.to_string(), schema);
        }

        if let Some(request_body) = operation.get("requestBody") {
            let request_body = self.resolve(request_body);
            if let Some(schema) = request_body
                .pointer("/content/application~1json/schema")
                .map(|s| self.resolve(s))
            {
                properties.insert("body".to_string(), schema);
                if request_body
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    required.push("body".to_string());
                }
                body_field = Some("body".to_string());
            }
        }

        let mut inputs = json!({ "type": "object", "properties": properties });
        if !required.is_empty() {
            inputs["required"] = Value::Array(required.into_iter().map(Value::String).collect());
        }

        let outputs = self.response_schema(operation);
        let auth = self.extract_auth(operation);

        let template = HttpCallTemplate {
            name: None,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            http_method: parse_method(method),
            content_type: "application/json".to_string(),
            auth,
            headers: None,
            body_field,
            header_fields: if header_fields.is_empty() {
                None
            } else {
                Some(header_fields)
            },
            auth_tools: None,
        };

        Some(Tool {
            name: operation_id.to_string(),
            description,
            inputs,
            outputs,
            tags,
            average_response_size: None,
            tool_call_template: CallTemplate::Http(template),
        })
    }

    fn response_schema(&self, operation: &Value) -> Value {
        let Some(responses) = operation.get("responses") else {
            return json!({});
        };
        for status in ["200", "201", "default"] {
            let Some(response) = responses.get(status) else {
                continue;
            };
            let response = self.resolve(response);
            // OpenAPI 3.x puts the schema under a media type; Swagger 2.0
            // keeps it directly on the response.
            if let Some(schema) = response
                .pointer("/content/application~1json/schema")
                .or_else(|| response.get("schema"))
            {
                return self.resolve(schema);
            }
        }
        json!({})
    }

    /// Resolve `$ref` chains inside `value`, guarding against cycles.
    fn resolve(&self, value: &Value) -> Value {
        let mut visited = HashSet::new();
        self.resolve_inner(value, &mut visited)
    }

    fn resolve_inner(&self, value: &Value, visited: &mut HashSet<String>) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    if !visited.insert(reference.to_string()) {
                        // Reference cycle; break it with an empty schema.
                        return json!({});
                    }
                    let target = self
                        .lookup_pointer(reference)
                        .cloned()
                        .unwrap_or_else(|| json!({}));
                    let resolved = self.resolve_inner(&target, visited);
                    visited.remove(reference);
                    return resolved;
                }
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.resolve_inner(v, visited)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_inner(item, visited))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn lookup_pointer(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.document.pointer(pointer)
    }

    fn base_url(&self) -> String {
        if let Some(server_url) = self
            .document
            .pointer("/servers/0/url")
            .and_then(Value::as_str)
        {
            if server_url.starts_with("http://") || server_url.starts_with("https://") {
                return server_url.to_string();
            }
            // Relative server URL; anchor it to where the document came from.
            if let Some(origin) = self.spec_origin() {
                return format!("{}{}", origin, server_url);
            }
            return server_url.to_string();
        }

        if let Some(host) = self.document.get("host").and_then(Value::as_str) {
            let scheme = self
                .document
                .pointer("/schemes/0")
                .and_then(Value::as_str)
                .unwrap_or("https");
            let base_path = self
                .document
                .get("basePath")
                .and_then(Value::as_str)
                .unwrap_or("");
            return format!("{scheme}://{host}{base_path}");
        }

        self.spec_origin().unwrap_or_else(|| "/".to_string())
    }

    fn spec_origin(&self) -> Option<String> {
        let parsed = url::Url::parse(self.spec_url?).ok()?;
        let mut origin = format!("{}://{}", parsed.scheme(), parsed.host_str()?);
        if let Some(port) = parsed.port() {
            origin.push_str(&format!(":{port}"));
        }
        Some(origin)
    }

    fn next_placeholder(&mut self, stem: &str) -> String {
        self.placeholder_counter += 1;
        format!("${{{stem}_{}}}", self.placeholder_counter)
    }

    /// Auth from the operation's `security`, falling back to the document's
    /// global requirements. Caller credentials are used when they match the
    /// scheme; otherwise a numbered placeholder is emitted.
    fn extract_auth(&mut self, operation: &Value) -> Option<Auth> {
        let scheme = {
            let requirements = operation
                .get("security")
                .or_else(|| self.document.get("security"))?
                .as_array()?;
            let scheme_name = requirements
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|req| req.keys())
                .next()?;
            self.document
                .pointer(&format!("/components/securitySchemes/{scheme_name}"))
                .or_else(|| {
                    self.document
                        .pointer(&format!("/securityDefinitions/{scheme_name}"))
                })?
                .clone()
        };

        let scheme_type = scheme.get("type").and_then(Value::as_str)?.to_string();
        match scheme_type.as_str() {
            "apiKey" => {
                let var_name = scheme
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("X-Api-Key")
                    .to_string();
                let location = match scheme.get("in").and_then(Value::as_str) {
                    Some("query") => ApiKeyLocation::Query,
                    Some("cookie") => ApiKeyLocation::Cookie,
                    _ => ApiKeyLocation::Header,
                };
                if let Some(Auth::ApiKey(caller)) = self.auth_tools {
                    if caller.var_name == var_name && caller.location == location {
                        return Some(Auth::ApiKey(caller.clone()));
                    }
                }
                Some(Auth::ApiKey(ApiKeyAuth {
                    api_key: self.next_placeholder("API_KEY"),
                    var_name,
                    location,
                }))
            }
            "basic" => self.basic_auth(),
            "http" => match scheme.get("scheme").and_then(Value::as_str) {
                Some("basic") => self.basic_auth(),
                Some("bearer") => {
                    if let Some(Auth::ApiKey(caller)) = self.auth_tools {
                        if caller.var_name == "Authorization" {
                            return Some(Auth::ApiKey(caller.clone()));
                        }
                    }
                    Some(Auth::ApiKey(ApiKeyAuth {
                        api_key: self.next_placeholder("BEARER_TOKEN"),
                        var_name: "Authorization".to_string(),
                        location: ApiKeyLocation::Header,
                    }))
                }
                _ => None,
            },
            "oauth2" => {
                if let Some(Auth::OAuth2(caller)) = self.auth_tools {
                    return Some(Auth::OAuth2(caller.clone()));
                }
                let token_url = scheme
                    .pointer("/flows/clientCredentials/tokenUrl")
                    .or_else(|| scheme.get("tokenUrl"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Auth::OAuth2(OAuth2Auth {
                    token_url,
                    client_id: self.next_placeholder("CLIENT_ID"),
                    client_secret: self.next_placeholder("CLIENT_SECRET"),
                    scope: None,
                }))
            }
            other => {
                warn!(scheme = %other, "unsupported security scheme type");
                None
            }
        }
    }

    fn basic_auth(&mut self) -> Option<Auth> {
        if let Some(Auth::Basic(caller)) = self.auth_tools {
            return Some(Auth::Basic(caller.clone()));
        }
        Some(Auth::Basic(BasicAuth {
            username: self.next_placeholder("USERNAME"),
            password: self.next_placeholder("PASSWORD"),
        }))
    }
}

fn parse_method(method: &str) -> HttpMethod {
    match method {
        "post" => HttpMethod::Post,
        "put" => HttpMethod::Put,
        "delete" => HttpMethod::Delete,
        "patch" => HttpMethod::Patch,
        _ => HttpMethod::Get,
    }
}
