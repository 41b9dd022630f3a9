//! Auth application against live loopback endpoints.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::{json, Value};

    use utcp::{JsonObject, UtcpClient, UtcpClientConfig};

    use crate::support::{base_url, serve};

    fn config(value: Value) -> UtcpClientConfig {
        serde_json::from_value(value).unwrap()
    }

    async fn make_client() -> UtcpClient {
        UtcpClient::create(".", config(json!({}))).await.unwrap()
    }

    fn manual_with_tool(template: Value) -> String {
        json!({"tools": [{"name": "probe", "tool_call_template": template}]}).to_string()
    }

    #[tokio::test]
    async fn test_api_key_header_injection() {
        async fn probe(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            match headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) {
                Some("sekrit") => Ok(Json(json!({"ok": true}))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }
        let addr = serve(Router::new().route("/probe", get(probe))).await;
        let base = base_url(addr);

        let client = make_client().await;
        let manual = manual_with_tool(json!({
            "call_template_type": "http",
            "url": format!("{base}/probe"),
            "auth": {"auth_type": "api_key", "api_key": "${KEY}"},
        }));
        let template = serde_json::from_value(json!({
            "call_template_type": "text", "name": "svc", "content": manual,
        }))
        .unwrap();
        std::env::set_var("svc_KEY", "sekrit");
        assert!(client.register_manual(template).await.unwrap().success);

        let result = client.call_tool("svc.probe", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        std::env::remove_var("svc_KEY");
    }

    #[tokio::test]
    async fn test_api_key_query_injection() {
        async fn probe(Query(params): Query<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
            if params.get("key").map(String::as_str) == Some("q-secret") {
                Ok(Json(json!({"ok": true})))
            } else {
                Err(StatusCode::UNAUTHORIZED)
            }
        }
        let addr = serve(Router::new().route("/probe", get(probe))).await;
        let base = base_url(addr);

        let client = make_client().await;
        let manual = manual_with_tool(json!({
            "call_template_type": "http",
            "url": format!("{base}/probe"),
            "auth": {
                "auth_type": "api_key", "api_key": "q-secret",
                "var_name": "key", "location": "query"
            },
        }));
        let template = serde_json::from_value(json!({
            "call_template_type": "text", "name": "qsvc", "content": manual,
        }))
        .unwrap();
        assert!(client.register_manual(template).await.unwrap().success);

        let result = client.call_tool("qsvc.probe", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        async fn probe(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            // base64("bob:hunter2")
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Basic Ym9iOmh1bnRlcjI=") => Ok(Json(json!({"ok": true}))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }
        let addr = serve(Router::new().route("/probe", get(probe))).await;
        let base = base_url(addr);

        let client = make_client().await;
        let manual = manual_with_tool(json!({
            "call_template_type": "http",
            "url": format!("{base}/probe"),
            "auth": {"auth_type": "basic", "username": "bob", "password": "hunter2"},
        }));
        let template = serde_json::from_value(json!({
            "call_template_type": "text", "name": "bsvc", "content": manual,
        }))
        .unwrap();
        assert!(client.register_manual(template).await.unwrap().success);

        let result = client.call_tool("bsvc.probe", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    /// Client-credentials grant with the credentials in the form body; the
    /// token is cached across calls.
    #[tokio::test]
    async fn test_oauth2_token_fetch_and_cache() {
        #[derive(Clone, Default)]
        struct TokenCounter(Arc<AtomicUsize>);

        async fn token(
            State(counter): State<TokenCounter>,
            Form(form): Form<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            if form.get("grant_type").map(String::as_str) != Some("client_credentials")
                || form.get("client_id").map(String::as_str) != Some("cid")
                || form.get("client_secret").map(String::as_str) != Some("cs")
            {
                return Err(StatusCode::BAD_REQUEST);
            }
            counter.0.fetch_add(1, Ordering::SeqCst);
            Ok(Json(json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
        }
        async fn probe(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer tok-1") => Ok(Json(json!({"ok": true}))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }

        let counter = TokenCounter::default();
        let router = Router::new()
            .route("/token", post(token))
            .route("/probe", get(probe))
            .with_state(counter.clone());
        let addr = serve(router).await;
        let base = base_url(addr);

        let client = make_client().await;
        let manual = manual_with_tool(json!({
            "call_template_type": "http",
            "url": format!("{base}/probe"),
            "auth": {
                "auth_type": "oauth2",
                "token_url": format!("{base}/token"),
                "client_id": "cid",
                "client_secret": "cs"
            },
        }));
        let template = serde_json::from_value(json!({
            "call_template_type": "text", "name": "osvc", "content": manual,
        }))
        .unwrap();
        assert!(client.register_manual(template).await.unwrap().success);

        for _ in 0..3 {
            let result = client.call_tool("osvc.probe", &JsonObject::new()).await.unwrap();
            assert_eq!(result, json!({"ok": true}));
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1, "token must be cached");
    }

    /// When the body-credential attempt is rejected, the grant retries with
    /// HTTP Basic credentials.
    #[tokio::test]
    async fn test_oauth2_basic_fallback() {
        #[derive(Clone, Default)]
        struct Attempts(Arc<AtomicUsize>);

        async fn token(
            State(attempts): State<Attempts>,
            headers: HeaderMap,
            Form(form): Form<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            attempts.0.fetch_add(1, Ordering::SeqCst);
            if form.contains_key("client_secret") {
                // This endpoint only accepts basic-auth credentials.
                return Err(StatusCode::BAD_REQUEST);
            }
            // base64("cid:cs")
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Basic Y2lkOmNz") => Ok(Json(json!({"access_token": "tok-2"}))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }
        async fn probe(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer tok-2") => Ok(Json(json!({"ok": true}))),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }

        let attempts = Attempts::default();
        let router = Router::new()
            .route("/token", post(token))
            .route("/probe", get(probe))
            .with_state(attempts.clone());
        let addr = serve(router).await;
        let base = base_url(addr);

        let client = make_client().await;
        let manual = manual_with_tool(json!({
            "call_template_type": "http",
            "url": format!("{base}/probe"),
            "auth": {
                "auth_type": "oauth2",
                "token_url": format!("{base}/token"),
                "client_id": "cid",
                "client_secret": "cs",
                "scope": "read"
            },
        }));
        let template = serde_json::from_value(json!({
            "call_template_type": "text", "name": "fsvc", "content": manual,
        }))
        .unwrap();
        assert!(client.register_manual(template).await.unwrap().success);

        let result = client.call_tool("fsvc.probe", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(attempts.0.load(Ordering::SeqCst), 2);
    }
}
