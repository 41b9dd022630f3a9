//! Transport-level URL policy.

use utcp_core::error::{UtcpError, UtcpResult};

/// Reject any target that is neither HTTPS nor loopback HTTP.
///
/// This is the only transport-security decision the runtime makes; it runs
/// before any socket is opened, including for OAuth2 token endpoints.
pub fn enforce_secure_url(url: &str) -> UtcpResult<()> {
    if url.starts_with("https://")
        || url.starts_with("http://localhost")
        || url.starts_with("http://127.0.0.1")
    {
        Ok(())
    } else {
        Err(UtcpError::InsecureUrl(url.to_string()))
    }
}
