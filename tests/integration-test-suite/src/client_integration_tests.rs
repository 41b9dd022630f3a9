//! Whole-client flows: discovery, search, OpenAPI registration, dotenv
//! variables, teardown.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use utcp::{JsonObject, UtcpClient, UtcpClientConfig};

    use crate::support::{base_url, serve};

    fn config(value: Value) -> UtcpClientConfig {
        serde_json::from_value(value).unwrap()
    }

    /// S5 end to end: an OpenAPI document served over HTTP becomes a
    /// registered manual whose tool carries the composed call template.
    #[tokio::test]
    async fn test_openapi_discovery_over_http() {
        async fn openapi() -> Json<Value> {
            Json(json!({
                "openapi": "3.0.0",
                "servers": [{"url": "https://api.example.com/v1"}],
                "paths": {
                    "/users/{id}": {
                        "get": {
                            "operationId": "getUser",
                            "summary": "Fetch one user",
                            "parameters": [{
                                "name": "id", "in": "path", "required": true,
                                "schema": {"type": "integer"}
                            }],
                            "responses": {"200": {"content": {"application/json": {
                                "schema": {"type": "object"}
                            }}}}
                        }
                    }
                }
            }))
        }
        let addr = serve(Router::new().route("/openapi.json", get(openapi))).await;
        let base = base_url(addr);

        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "http",
                    "name": "petstore",
                    "url": format!("{base}/openapi.json"),
                }]
            })),
        )
        .await
        .unwrap();

        let tool = client
            .get_tools()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.name == "petstore.getUser")
            .expect("converted tool registered");
        assert_eq!(
            tool.inputs["required"],
            json!(["id"])
        );
        let utcp::CallTemplate::Http(template) = &tool.tool_call_template else {
            panic!("expected http call template");
        };
        assert!(template.url.ends_with("/users/{id}"));
    }

    #[tokio::test]
    async fn test_search_over_registered_tools() {
        let manual = json!({"tools": [
            {
                "name": "get_weather",
                "description": "Current weather for a city",
                "tags": ["weather"],
                "tool_call_template": {
                    "call_template_type": "direct-call", "callable_name": "w"
                }
            },
            {
                "name": "get_invoice",
                "description": "Billing lookup",
                "tags": ["finance"],
                "tool_call_template": {
                    "call_template_type": "direct-call", "callable_name": "i"
                }
            }
        ]});
        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "text",
                    "name": "catalog",
                    "content": manual.to_string(),
                }]
            })),
        )
        .await
        .unwrap();

        let hits = client.search_tools("weather", 0, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "catalog.get_weather");

        let tag_limited = client
            .search_tools("get", 0, Some(&["finance".to_string()]))
            .await
            .unwrap();
        assert_eq!(tag_limited.len(), 1);
        assert_eq!(tag_limited[0].name, "catalog.get_invoice");
    }

    /// Variables flow from a dotenv file into a manual's headers.
    #[tokio::test]
    async fn test_dotenv_loader_feeds_registration() {
        async fn manual(headers: HeaderMap) -> Json<Value> {
            assert_eq!(
                headers.get("x-team").unwrap().to_str().unwrap(),
                "platform"
            );
            Json(json!({"tools": []}))
        }
        let addr = serve(Router::new().route("/manual", get(manual))).await;
        let base = base_url(addr);

        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("secrets.env");
        let mut file = std::fs::File::create(&env_path).unwrap();
        writeln!(file, "teamsvc_TEAM=platform").unwrap();
        drop(file);

        let client = UtcpClient::create(
            dir.path(),
            config(json!({
                "load_variables_from": [
                    {"variable_loader_type": "dotenv", "env_file_path": "secrets.env"}
                ]
            })),
        )
        .await
        .unwrap();

        let template = serde_json::from_value(json!({
            "call_template_type": "http",
            "name": "teamsvc",
            "url": format!("{base}/manual"),
            "headers": {"X-Team": "${TEAM}"},
        }))
        .unwrap();
        let result = client.register_manual(template).await.unwrap();
        // The manual endpoint asserts the substituted header value; a wrong
        // or missing header panics the handler and fails registration.
        assert!(result.success, "{:?}", result.errors);
    }

    /// Config `variables` values resolve against loaders and env, never
    /// against sibling keys.
    #[tokio::test]
    async fn test_config_variables_do_not_chain() {
        std::env::set_var("utcp_itest_SOURCE", "resolved");
        let client = UtcpClient::create(
            ".",
            config(json!({
                "variables": {
                    "a__svc_FROM_ENV": "${utcp_itest_SOURCE}",
                }
            })),
        )
        .await
        .unwrap();
        std::env::remove_var("utcp_itest_SOURCE");

        let template = serde_json::from_value(json!({
            "call_template_type": "text",
            "name": "a_svc",
            "content": json!({"tools": [{
                "name": "show",
                "description": "${FROM_ENV}",
                "tool_call_template": {
                    "call_template_type": "direct-call", "callable_name": "show"
                }
            }]}).to_string(),
        }))
        .unwrap();
        let result = client.register_manual(template).await.unwrap();
        assert!(result.success);
        assert_eq!(result.manual.tools[0].description, "resolved");
    }

    #[tokio::test]
    async fn test_close_is_quiet() {
        let client = UtcpClient::create(".", config(json!({}))).await.unwrap();
        // Close never errors, and a second close is harmless.
        client.close().await;
        client.close().await;
    }
}
