//! End-to-end scenarios from the protocol's conformance notes.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use utcp::{JsonObject, UtcpClient, UtcpClientConfig, UtcpError};

    use crate::support::{base_url, serve};

    fn config(value: Value) -> UtcpClientConfig {
        serde_json::from_value(value).unwrap()
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().unwrap().clone()
    }

    /// S1: a GET with a path parameter sends the value in the path, not the
    /// query string, and returns the response verbatim.
    #[tokio::test]
    async fn test_http_get_with_path_parameter() {
        #[derive(Clone, Default)]
        struct Seen {
            queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        }

        let seen = Seen::default();
        async fn manual(State((_, base)): State<(Seen, String)>) -> Json<Value> {
            Json(json!({"tools": [{
                "name": "get_user",
                "description": "fetch a user by id",
                "tool_call_template": {
                    "call_template_type": "http",
                    "http_method": "GET",
                    "url": format!("{base}/users/{{id}}"),
                }
            }]}))
        }
        async fn get_user(
            Path(id): Path<u64>,
            Query(query): Query<HashMap<String, String>>,
            State((seen, _)): State<(Seen, String)>,
        ) -> Json<Value> {
            seen.queries.lock().unwrap().push(query);
            Json(json!({"id": id, "name": "Alice"}))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = base_url(addr);
        let router = Router::new()
            .route("/manual", get(manual))
            .route("/users/{id}", get(get_user))
            .with_state((seen.clone(), base.clone()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "http",
                    "name": "usersvc",
                    "url": format!("{base}/manual"),
                }]
            })),
        )
        .await
        .unwrap();

        let result = client
            .call_tool("usersvc.get_user", &args(json!({"id": 42})))
            .await
            .unwrap();
        assert_eq!(result, json!({"id": 42, "name": "Alice"}));

        let queries = seen.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].is_empty(), "id must not leak into the query");
    }

    /// S2: multi-step CLI chaining through `$CMD_<i>_OUTPUT`.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_multi_step_chaining() {
        let manual = json!({"tools": [{
            "name": "chain",
            "tool_call_template": {
                "call_template_type": "cli",
                "commands": [
                    {"command": "echo hello", "append_to_final_output": false},
                    {"command": "echo prev=$CMD_0_OUTPUT", "append_to_final_output": true}
                ]
            }
        }]});
        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "text",
                    "name": "local",
                    "content": manual.to_string(),
                }]
            })),
        )
        .await
        .unwrap();

        let result = client
            .call_tool("local.chain", &JsonObject::new())
            .await
            .unwrap();
        assert_eq!(result, json!("prev=hello"));
    }

    /// S3: two manuals reading `${TOKEN}` resolve through their own
    /// namespaces and cannot observe each other's values.
    #[tokio::test]
    async fn test_namespaced_variable_isolation() {
        type Headers = Arc<Mutex<HashMap<String, String>>>;

        async fn manual(
            Path(which): Path<String>,
            headers: HeaderMap,
            State(seen): State<Headers>,
        ) -> Json<Value> {
            let authorization = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            seen.lock().unwrap().insert(which, authorization);
            Json(json!({"tools": []}))
        }

        let seen: Headers = Arc::default();
        let router = Router::new()
            .route("/manual/{which}", get(manual))
            .with_state(Arc::clone(&seen));
        let addr = serve(router).await;
        let base = base_url(addr);

        let client = UtcpClient::create(
            ".",
            config(json!({
                "variables": {
                    "github__api_TOKEN": "g",
                    "slack__api_TOKEN": "s"
                }
            })),
        )
        .await
        .unwrap();

        for name in ["github_api", "slack_api"] {
            let template = serde_json::from_value(json!({
                "call_template_type": "http",
                "name": name,
                "url": format!("{base}/manual/{name}"),
                "headers": {"Authorization": "Bearer ${TOKEN}"},
            }))
            .unwrap();
            let result = client.register_manual(template).await.unwrap();
            assert!(result.success, "{name} registration failed: {:?}", result.errors);
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen["github_api"], "Bearer g");
        assert_eq!(seen["slack_api"], "Bearer s");
    }

    /// S4: a missing namespaced variable fails only its own manual;
    /// batch-mates still register and the repository is untouched by the
    /// failure.
    #[tokio::test]
    async fn test_missing_variable_isolated_in_batch() {
        async fn manual(headers: HeaderMap) -> Json<Value> {
            assert_eq!(
                headers.get("authorization").unwrap().to_str().unwrap(),
                "Bearer g"
            );
            Json(json!({"tools": [{
                "name": "whoami",
                "tool_call_template": {
                    "call_template_type": "http",
                    "url": "http://127.0.0.1:1/unused"
                }
            }]}))
        }

        let addr = serve(Router::new().route("/manual", get(manual))).await;
        let base = base_url(addr);

        let client = UtcpClient::create(
            ".",
            config(json!({
                "variables": {"github__api_TOKEN": "g"}
            })),
        )
        .await
        .unwrap();

        let make_template = |name: &str| -> utcp::CallTemplate {
            serde_json::from_value(json!({
                "call_template_type": "http",
                "name": name,
                "url": format!("{base}/manual"),
                "headers": {"Authorization": "Bearer ${TOKEN}"},
            }))
            .unwrap()
        };

        let results = client
            .register_manuals(vec![make_template("github_api"), make_template("slack_api")])
            .await;

        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1]
            .errors
            .iter()
            .any(|e| e.contains("slack__api_TOKEN")));

        let tools = client.get_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "github_api.whoami");
    }

    /// S6: a second registration under an existing name is rejected and
    /// the first manual stays intact.
    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let manual = json!({"tools": [{
            "name": "first",
            "tool_call_template": {
                "call_template_type": "direct-call", "callable_name": "first"
            }
        }]});
        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "text",
                    "name": "m",
                    "content": manual.to_string(),
                }]
            })),
        )
        .await
        .unwrap();

        let second = serde_json::from_value(json!({
            "call_template_type": "text",
            "name": "m",
            "content": "{\"tools\": []}",
        }))
        .unwrap();
        let err = client.register_manual(second).await.unwrap_err();
        assert!(matches!(err, UtcpError::NameConflict(name) if name == "m"));

        let tools = client.get_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "m.first");
    }

    /// Invariant 7: non-loopback plain HTTP is rejected before any socket
    /// opens, for both registration and calls.
    #[tokio::test]
    async fn test_insecure_url_rejected_everywhere() {
        let manual = json!({"tools": [{
            "name": "t",
            "tool_call_template": {
                "call_template_type": "http",
                "url": "http://192.0.2.1/tool"
            }
        }]});
        let client = UtcpClient::create(
            ".",
            config(json!({
                "manual_call_templates": [{
                    "call_template_type": "text",
                    "name": "m",
                    "content": manual.to_string(),
                }]
            })),
        )
        .await
        .unwrap();

        let register_err = client
            .register_manual(
                serde_json::from_value(json!({
                    "call_template_type": "http",
                    "name": "insecure",
                    "url": "http://192.0.2.1/manual",
                }))
                .unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(register_err, UtcpError::InsecureUrl(_)));

        let call_err = client
            .call_tool("m.t", &JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(call_err, UtcpError::InsecureUrl(_)));
    }
}
