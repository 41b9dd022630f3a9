//! OAuth2 client-credentials grant with per-protocol token caching.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::types::auth::OAuth2Auth;

use crate::security::enforce_secure_url;

/// Token endpoint response per RFC 6749 §5.1.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Access tokens keyed by client id, shared by one protocol instance.
///
/// Tokens without an `expires_in` stay cached until the protocol closes.
#[derive(Default)]
pub struct OAuth2TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl OAuth2TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a valid bearer token for `auth`, fetching one when the cache
    /// has none or the cached entry expired.
    pub async fn bearer_token(
        &self,
        client: &reqwest::Client,
        auth: &OAuth2Auth,
    ) -> UtcpResult<String> {
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(&auth.client_id) {
            if !cached.expired() {
                return Ok(cached.access_token.clone());
            }
            debug!(client_id = %auth.client_id, "cached token expired, re-fetching");
        }

        let fetched = fetch_token(client, auth).await?;
        let token = fetched.access_token.clone();
        tokens.insert(
            auth.client_id.clone(),
            CachedToken {
                access_token: fetched.access_token,
                expires_at: fetched
                    .expires_in
                    .map(|secs| Instant::now() + Duration::from_secs(secs)),
            },
        );
        Ok(token)
    }

    pub async fn clear(&self) {
        self.tokens.lock().await.clear();
    }
}

/// Perform the client-credentials grant.
///
/// First attempt posts the credentials in the form body. If that fails for
/// any reason, the second attempt sends only `grant_type` and `scope` and
/// carries the credentials as HTTP Basic auth. The last error is surfaced
/// when both fail.
async fn fetch_token(client: &reqwest::Client, auth: &OAuth2Auth) -> UtcpResult<TokenResponse> {
    enforce_secure_url(&auth.token_url)?;

    let mut body_params = vec![
        ("grant_type", "client_credentials"),
        ("client_id", auth.client_id.as_str()),
        ("client_secret", auth.client_secret.as_str()),
    ];
    if let Some(scope) = &auth.scope {
        body_params.push(("scope", scope.as_str()));
    }

    let body_error = match request_token(
        client.post(&auth.token_url).form(&body_params),
    )
    .await
    {
        Ok(token) => return Ok(token),
        Err(e) => e,
    };
    warn!(
        token_url = %auth.token_url,
        error = %body_error,
        "credentials-in-body token request failed, retrying with basic auth"
    );

    let mut basic_params = vec![("grant_type", "client_credentials")];
    if let Some(scope) = &auth.scope {
        basic_params.push(("scope", scope.as_str()));
    }
    request_token(
        client
            .post(&auth.token_url)
            .basic_auth(&auth.client_id, Some(&auth.client_secret))
            .form(&basic_params),
    )
    .await
}

async fn request_token(request: reqwest::RequestBuilder) -> UtcpResult<TokenResponse> {
    let response = request
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| UtcpError::call_failed("oauth2", format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UtcpError::call_failed(
            "oauth2",
            format!("token endpoint returned {status}: {body}"),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| UtcpError::call_failed("oauth2", format!("invalid token response: {e}")))
}
