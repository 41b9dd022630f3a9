//! Authentication schemes attached to call templates.
//!
//! Auth values describe *credentials*, not policy. The HTTP protocols apply
//! them to outbound requests; how a key was provisioned is the caller's
//! concern. Secrets normally arrive as `${VAR}` references and are resolved
//! by the variable substitutor just before each use.

use serde::{Deserialize, Serialize};

/// Where an API key is injected into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
    Cookie,
}

/// API key authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    /// The key value, usually a `${VAR}` reference.
    pub api_key: String,

    /// Header, query-parameter, or cookie name the key travels under.
    #[serde(default = "default_var_name")]
    pub var_name: String,

    #[serde(default)]
    pub location: ApiKeyLocation,
}

fn default_var_name() -> String {
    "X-Api-Key".to_string()
}

/// HTTP Basic authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// OAuth2 client-credentials authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Auth {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Tagged auth scheme, discriminated by `auth_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "auth_type")]
pub enum Auth {
    #[serde(rename = "api_key")]
    ApiKey(ApiKeyAuth),
    #[serde(rename = "basic")]
    Basic(BasicAuth),
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Auth),
}

impl Auth {
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::ApiKey(_) => "api_key",
            Auth::Basic(_) => "basic",
            Auth::OAuth2(_) => "oauth2",
        }
    }
}
