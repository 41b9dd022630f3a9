//! Applying auth schemes to outbound requests.

use base64::Engine as _;

use utcp_core::error::{UtcpError, UtcpResult};
use utcp_core::types::auth::{ApiKeyLocation, Auth};

use crate::oauth::OAuth2TokenCache;

/// Attach credentials to a request builder.
///
/// `api_key` injects the key as a header, query parameter, or cookie;
/// `basic` sends an `Authorization: Basic` header; `oauth2` resolves a
/// bearer token through the protocol's token cache.
pub async fn apply_auth(
    request: reqwest::RequestBuilder,
    auth: Option<&Auth>,
    token_cache: &OAuth2TokenCache,
    client: &reqwest::Client,
) -> UtcpResult<reqwest::RequestBuilder> {
    let Some(auth) = auth else {
        return Ok(request);
    };
    match auth {
        Auth::ApiKey(key) => {
            if key.api_key.is_empty() {
                return Err(UtcpError::missing_credential("api_key"));
            }
            Ok(match key.location {
                ApiKeyLocation::Header => {
                    request.header(key.var_name.as_str(), key.api_key.as_str())
                }
                ApiKeyLocation::Query => request.query(&[(&key.var_name, &key.api_key)]),
                ApiKeyLocation::Cookie => {
                    request.header("Cookie", format!("{}={}", key.var_name, key.api_key))
                }
            })
        }
        Auth::Basic(basic) => {
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", basic.username, basic.password));
            Ok(request.header("Authorization", format!("Basic {encoded}")))
        }
        Auth::OAuth2(oauth) => {
            let token = token_cache.bearer_token(client, oauth).await?;
            Ok(request.header("Authorization", format!("Bearer {token}")))
        }
    }
}
