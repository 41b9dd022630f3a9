//! Streamable HTTP and SSE behavior.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use futures::StreamExt;
    use serde_json::{json, Value};

    use utcp::{JsonObject, UtcpClient, UtcpClientConfig};

    use crate::support::{base_url, serve};

    fn config(value: Value) -> UtcpClientConfig {
        serde_json::from_value(value).unwrap()
    }

    async fn make_client(value: Value) -> UtcpClient {
        UtcpClient::create(".", config(value)).await.unwrap()
    }

    async fn register_text_manual(client: &UtcpClient, name: &str, tools: Value) {
        let template = serde_json::from_value(json!({
            "call_template_type": "text",
            "name": name,
            "content": json!({"tools": tools}).to_string(),
        }))
        .unwrap();
        let result = client.register_manual(template).await.unwrap();
        assert!(result.success, "{name}: {:?}", result.errors);
    }

    #[tokio::test]
    async fn test_streamable_http_chunks_and_concatenation() {
        async fn stream() -> impl IntoResponse {
            let chunks: Vec<Result<&'static str, std::io::Error>> =
                vec![Ok("one"), Ok("two"), Ok("three")];
            (
                [(header::CONTENT_TYPE, "text/plain")],
                Body::from_stream(futures::stream::iter(chunks)),
            )
        }
        let addr = serve(Router::new().route("/stream", get(stream))).await;
        let base = base_url(addr);

        let client = make_client(json!({})).await;
        register_text_manual(
            &client,
            "s",
            json!([{
                "name": "feed",
                "tool_call_template": {
                    "call_template_type": "streamable_http",
                    "url": format!("{base}/stream"),
                }
            }]),
        )
        .await;

        // Streaming: chunk boundaries are transport-dependent, but the
        // concatenation is not.
        let mut stream = client
            .call_tool_streaming("s.feed", &JsonObject::new())
            .await
            .unwrap();
        let mut collected = String::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            let value = chunk.unwrap();
            collected.push_str(value.as_str().unwrap());
            chunks += 1;
        }
        assert!(chunks >= 1);
        assert_eq!(collected, "onetwothree");

        // Non-streaming call is the concatenation.
        let result = client.call_tool("s.feed", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!("onetwothree"));
    }

    #[tokio::test]
    async fn test_sse_events_filtered_and_collected() {
        async fn events() -> impl IntoResponse {
            let body = concat!(
                ": warm-up comment\n\n",
                "event: update\ndata: {\"n\": 1}\n\n",
                "event: noise\ndata: {\"ignored\": true}\n\n",
                "event: update\ndata: {\"n\": 2}\n\n",
            );
            ([(header::CONTENT_TYPE, "text/event-stream")], body)
        }
        let addr = serve(Router::new().route("/events", get(events))).await;
        let base = base_url(addr);

        let client = make_client(json!({})).await;
        register_text_manual(
            &client,
            "evt",
            json!([{
                "name": "watch",
                "tool_call_template": {
                    "call_template_type": "sse",
                    "url": format!("{base}/events"),
                    "event_type": "update",
                    "reconnect": false,
                }
            }]),
        )
        .await;

        let result = client.call_tool("evt.watch", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!([{"n": 1}, {"n": 2}]));
    }

    #[tokio::test]
    async fn test_sse_unfiltered_yields_every_event() {
        async fn events() -> impl IntoResponse {
            let body = "data: first\n\ndata: second\n\n";
            ([(header::CONTENT_TYPE, "text/event-stream")], body)
        }
        let addr = serve(Router::new().route("/events", get(events))).await;
        let base = base_url(addr);

        let client = make_client(json!({})).await;
        register_text_manual(
            &client,
            "all",
            json!([{
                "name": "watch",
                "tool_call_template": {
                    "call_template_type": "sse",
                    "url": format!("{base}/events"),
                    "reconnect": false,
                }
            }]),
        )
        .await;

        let mut stream = client
            .call_tool_streaming("all.watch", &JsonObject::new())
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Some(chunk) = stream.next().await {
            seen.push(chunk.unwrap());
        }
        assert_eq!(seen, vec![json!("first"), json!("second")]);
    }

    /// Post-processors run on every chunk, and chunks they empty out are
    /// still delivered.
    #[tokio::test]
    async fn test_post_processing_applies_to_chunks() {
        async fn events() -> impl IntoResponse {
            let body = concat!(
                "data: {\"keep\": \"abcdef\", \"debug\": \"x\"}\n\n",
                "data: {\"debug\": \"only\"}\n\n",
            );
            ([(header::CONTENT_TYPE, "text/event-stream")], body)
        }
        let addr = serve(Router::new().route("/events", get(events))).await;
        let base = base_url(addr);

        let client = make_client(json!({
            "post_processing": [
                {"tool_post_processor_type": "filter_dict", "exclude_keys": ["debug"]},
                {"tool_post_processor_type": "limit_strings", "limit": 3}
            ]
        }))
        .await;
        register_text_manual(
            &client,
            "pp",
            json!([{
                "name": "watch",
                "tool_call_template": {
                    "call_template_type": "sse",
                    "url": format!("{base}/events"),
                    "reconnect": false,
                }
            }]),
        )
        .await;

        let mut stream = client
            .call_tool_streaming("pp.watch", &JsonObject::new())
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Some(chunk) = stream.next().await {
            seen.push(chunk.unwrap());
        }
        assert_eq!(seen, vec![json!({"keep": "abc"}), json!({})]);
    }

    /// Dedicated JSON endpoint: non-stream call of a streamable template
    /// parses the concatenated body as JSON.
    #[tokio::test]
    async fn test_streamable_json_concatenation_parses() {
        async fn stream() -> Json<Value> {
            Json(json!({"total": 3}))
        }
        let addr = serve(Router::new().route("/json", get(stream))).await;
        let base = base_url(addr);

        let client = make_client(json!({})).await;
        register_text_manual(
            &client,
            "j",
            json!([{
                "name": "totals",
                "tool_call_template": {
                    "call_template_type": "streamable_http",
                    "url": format!("{base}/json"),
                }
            }]),
        )
        .await;

        let result = client.call_tool("j.totals", &JsonObject::new()).await.unwrap();
        assert_eq!(result, json!({"total": 3}));
    }
}
