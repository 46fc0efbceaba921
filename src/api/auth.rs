//! Token cache and refresher
//!
//! Holds at most one access token per service and renews it through the
//! region's OAuth authority with the refresh-token grant. Refreshes are
//! single-flight per service: concurrent callers that find the token missing
//! or expired wait for the one in-flight refresh and reuse its result.

use super::credentials::CredentialRegistry;
use super::constants::{self, TOKEN_EXPIRY_MARGIN};
use super::error::{GatewayError, GatewayResult, truncate_body};
use super::models::{CredentialRecord, Service, TokenInfo};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Source of "now" for expiry decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: StdMutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: StdMutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.base + offset
    }
}

/// What the dispatcher needs from a token provider
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Current valid access token for the service, refreshing if needed
    async fn access_token(&self, service: Service) -> GatewayResult<String>;

    /// Forget `rejected` so the next call refreshes. A newer token stored by
    /// a concurrent caller is kept.
    async fn invalidate(&self, service: Service, rejected: &str);
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// Lifetime actually trusted for a token the server says lives `lifetime`.
///
/// The safety margin only applies when the lifetime is more than twice the
/// margin; shorter lifetimes are used in full.
pub fn effective_lifetime(lifetime: Duration) -> Duration {
    if lifetime > TOKEN_EXPIRY_MARGIN * 2 {
        lifetime - TOKEN_EXPIRY_MARGIN
    } else {
        lifetime
    }
}

pub struct TokenCache {
    http_client: reqwest::Client,
    registry: Arc<CredentialRegistry>,
    token_url: String,
    clock: Arc<dyn Clock>,
    tokens: RwLock<HashMap<Service, TokenInfo>>,
    refresh_guards: HashMap<Service, Mutex<()>>,
    refresh_count: AtomicU64,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_url", &self.token_url)
            .field("refresh_count", &self.refresh_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(http_client: reqwest::Client, registry: Arc<CredentialRegistry>, token_url: String) -> Self {
        Self::with_clock(http_client, registry, token_url, Arc::new(SystemClock))
    }

    pub fn with_clock(
        http_client: reqwest::Client,
        registry: Arc<CredentialRegistry>,
        token_url: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let refresh_guards = Service::ALL
            .iter()
            .map(|service| (*service, Mutex::new(())))
            .collect();

        Self {
            http_client,
            registry,
            token_url,
            clock,
            tokens: RwLock::new(HashMap::new()),
            refresh_guards,
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Access token for a service; refreshes synchronously when absent or expired
    pub async fn get_access_token(&self, service: Service) -> GatewayResult<String> {
        self.get_token_info(service)
            .await
            .map(|token| token.access_token)
    }

    /// Like [`get_access_token`](Self::get_access_token) but with the expiry
    pub async fn get_token_info(&self, service: Service) -> GatewayResult<TokenInfo> {
        // Unconfigured services fail here, before any network call
        let record = self.registry.credentials(service)?;

        if let Some(token) = self.valid_cached(service).await {
            debug!("Using cached token for service: {}", service);
            return Ok(token);
        }

        let Some(guard) = self.refresh_guards.get(&service) else {
            return Err(GatewayError::config(service, "no refresh guard for service"));
        };
        let _singleflight = guard.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.valid_cached(service).await {
            debug!("Reusing token refreshed concurrently for service: {}", service);
            return Ok(token);
        }

        let token = self.refresh(record).await?;
        self.tokens.write().await.insert(service, token.clone());
        Ok(token)
    }

    /// Cached entry, valid or not, without refreshing
    pub async fn cached(&self, service: Service) -> Option<TokenInfo> {
        self.tokens.read().await.get(&service).cloned()
    }

    /// Drop the cached token for a service if it is still `rejected`
    pub async fn invalidate(&self, service: Service, rejected: &str) {
        let mut tokens = self.tokens.write().await;
        match tokens.get(&service) {
            Some(current) if current.access_token == rejected => {
                tokens.remove(&service);
                info!("Invalidated cached token for service: {}", service);
            }
            Some(_) => {
                debug!("Token for {} already replaced; keeping the newer one", service);
            }
            None => {}
        }
    }

    /// Number of successful refreshes since construction
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    async fn valid_cached(&self, service: Service) -> Option<TokenInfo> {
        let now = self.clock.now();
        let tokens = self.tokens.read().await;
        match tokens.get(&service) {
            Some(token) if !token.is_expired(now) => Some(token.clone()),
            Some(_) => {
                debug!("Cached token expired for service: {}", service);
                None
            }
            None => None,
        }
    }

    async fn refresh(&self, record: &CredentialRecord) -> GatewayResult<TokenInfo> {
        let service = record.service;
        info!("Refreshing access token for service: {}", service);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", record.refresh_token.as_str()),
                ("client_id", record.client_id.as_str()),
                ("client_secret", record.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("Token request for {} did not complete: {}", service, e);
                GatewayError::TokenRefreshFailed {
                    service,
                    status: None,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        debug!("Token request status for {}: {}", service, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token refresh for {} rejected with status {}", service, status);
            return Err(GatewayError::TokenRefreshFailed {
                service,
                status: Some(status.as_u16()),
                message: truncate_body(&body),
            });
        }

        let token_data: TokenResponse = response.json().await.map_err(|e| GatewayError::TokenRefreshFailed {
            service,
            status: Some(status.as_u16()),
            message: format!("invalid token response: {}", e),
        })?;

        let Some(access_token) = token_data.access_token else {
            let message = token_data
                .error
                .unwrap_or_else(|| "no access_token in response".to_string());
            warn!("Token refresh for {} returned no token: {}", service, message);
            return Err(GatewayError::TokenRefreshFailed {
                service,
                status: Some(status.as_u16()),
                message,
            });
        };

        let lifetime = token_data
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(constants::DEFAULT_TOKEN_LIFETIME);
        let expires_at = self.clock.now() + effective_lifetime(lifetime);

        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        info!(
            "Obtained access token for {} (valid for {}s)",
            service,
            effective_lifetime(lifetime).as_secs()
        );

        Ok(TokenInfo {
            access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl AccessTokenSource for TokenCache {
    async fn access_token(&self, service: Service) -> GatewayResult<String> {
        self.get_access_token(service).await
    }

    async fn invalidate(&self, service: Service, rejected: &str) {
        TokenCache::invalidate(self, service, rejected).await
    }
}
