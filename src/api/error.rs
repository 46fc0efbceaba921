//! Error taxonomy for gateway calls
//!
//! Every failure a collaborator can observe is one of these variants. The
//! dispatcher only recovers from authentication expiry and rate limiting;
//! everything else is returned unchanged through the adapters.

use super::models::Service;
use thiserror::Error;

/// Maximum number of characters of an upstream body kept for diagnostics
pub const MAX_ERROR_BODY_CHARS: usize = 512;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required credential or region mapping is missing
    #[error("configuration error for {service}: {reason}")]
    Config { service: Service, reason: String },

    /// The OAuth authority rejected the refresh
    #[error("token refresh failed for {service} (status {status:?}): {message}")]
    TokenRefreshFailed {
        service: Service,
        status: Option<u16>,
        message: String,
    },

    /// Downstream still rejected the call after a forced token refresh
    #[error("authentication failed for {service} after {attempts} attempts [{correlation_id}]")]
    AuthenticationFailed {
        service: Service,
        correlation_id: String,
        attempts: u32,
    },

    /// Downstream kept answering 429 until the retry budget ran out
    #[error("rate limited by {service} after {attempts} attempts [{correlation_id}]")]
    RateLimited {
        service: Service,
        correlation_id: String,
        attempts: u32,
    },

    /// Any other non-2xx response, or a 2xx body the adapter cannot use
    #[error("{service} returned {status} [{correlation_id}]: {body}")]
    Upstream {
        service: Service,
        status: u16,
        body: String,
        correlation_id: String,
    },

    /// DNS, connection, TLS or body decoding failure
    #[error("transport error talking to {service} [{correlation_id}]: {message}")]
    Transport {
        service: Service,
        correlation_id: String,
        message: String,
    },

    /// Caller deadline exceeded mid-call
    #[error("{service} call exceeded its deadline of {deadline_ms}ms [{correlation_id}]")]
    Timeout {
        service: Service,
        correlation_id: String,
        deadline_ms: u128,
    },
}

impl GatewayError {
    pub fn config(service: Service, reason: impl Into<String>) -> Self {
        GatewayError::Config {
            service,
            reason: reason.into(),
        }
    }

    /// Stable category tag used in logs and by collaborators
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Config { .. } => "config_error",
            GatewayError::TokenRefreshFailed { .. } => "token_refresh_failed",
            GatewayError::AuthenticationFailed { .. } => "authentication_failed",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::Transport { .. } => "transport_error",
            GatewayError::Timeout { .. } => "timeout",
        }
    }

    pub fn service(&self) -> Service {
        match self {
            GatewayError::Config { service, .. }
            | GatewayError::TokenRefreshFailed { service, .. }
            | GatewayError::AuthenticationFailed { service, .. }
            | GatewayError::RateLimited { service, .. }
            | GatewayError::Upstream { service, .. }
            | GatewayError::Transport { service, .. }
            | GatewayError::Timeout { service, .. } => *service,
        }
    }

    /// HTTP status associated with the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::TokenRefreshFailed { status, .. } => *status,
            GatewayError::AuthenticationFailed { .. } => Some(401),
            GatewayError::RateLimited { .. } => Some(429),
            GatewayError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            GatewayError::AuthenticationFailed { correlation_id, .. }
            | GatewayError::RateLimited { correlation_id, .. }
            | GatewayError::Upstream { correlation_id, .. }
            | GatewayError::Transport { correlation_id, .. }
            | GatewayError::Timeout { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    /// Whether the same call may succeed if the collaborator tries again later.
    /// No gateway error implies partial success either way.
    pub fn is_retryable_later(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. }
            | GatewayError::Transport { .. }
            | GatewayError::Timeout { .. } => true,
            GatewayError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Cut a response body down to a size that is safe to log and carry around
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}
