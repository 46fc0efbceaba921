//! API constants for the Zoho platform gateway

use std::time::Duration;

/// Token endpoint path appended to a region's OAuth authority
pub const TOKEN_PATH: &str = "/oauth/v2/token";

/// Scheme used in the `Authorization` header
pub const AUTH_SCHEME: &str = "Zoho-oauthtoken";

/// Safety margin subtracted from server-provided token lifetimes
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the authority omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Additional attempts allowed per logical call
pub const DEFAULT_RETRY_BUDGET: u32 = 2;

/// First 429 backoff; doubles on each further retry
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(600);

/// Standard headers for gateway requests
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const ACCEPT: &str = "Accept";
    pub const CONTENT_TYPE: &str = "Content-Type";

    /// Correlation header attached to every attempt of a logical call
    pub const X_CORRELATION_ID: &str = "X-Correlation-ID";

    pub const CONTENT_TYPE_JSON: &str = "application/json";
}

/// Build the token endpoint URL for an authority
pub fn token_endpoint(authority_url: &str) -> String {
    format!("{}{}", authority_url.trim_end_matches('/'), TOKEN_PATH)
}

/// Whether `path` is an absolute http(s) URL rather than a relative path
pub fn is_absolute_url(path: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        path.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Join a service base URL and a relative request path
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
