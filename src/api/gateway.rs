use super::auth::{AccessTokenSource, Clock, SystemClock, TokenCache};
use super::credentials::CredentialRegistry;
use super::dispatcher::Dispatcher;
use super::error::GatewayResult;
use super::models::{RegionConfig, Service};
use super::region::RegionResolver;
use super::request::{ApiResponse, RequestDescriptor};
use super::resilience::{MetricsCollector, ResilienceConfig};
use super::services::{
    AccountingAdapter, CrmAdapter, FileStorageAdapter, MailingListsAdapter, ProjectsAdapter, SchedulingAdapter,
};
use crate::config::GatewayConfig;
use anyhow::Context;
use log::info;
use std::sync::Arc;

/// Owns the registry, resolver, token cache and dispatcher for one region.
///
/// Cloning is cheap; clones share the token cache and metrics. Hand a clone
/// to every request handler instead of keeping a global.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    registry: Arc<CredentialRegistry>,
    resolver: Arc<RegionResolver>,
    tokens: Arc<TokenCache>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let region = config.region_config()?;
        let resilience = config.resilience()?;
        let registry = CredentialRegistry::from_config(config);
        Self::new(registry, region, resilience)
    }

    pub fn new(registry: CredentialRegistry, region: RegionConfig, resilience: ResilienceConfig) -> anyhow::Result<Self> {
        Self::with_clock(registry, region, resilience, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit clock for token expiry
    pub fn with_clock(
        registry: CredentialRegistry,
        region: RegionConfig,
        resilience: ResilienceConfig,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(resilience.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let registry = Arc::new(registry);
        let resolver = Arc::new(RegionResolver::new(region));
        let tokens = Arc::new(TokenCache::with_clock(
            http_client.clone(),
            registry.clone(),
            resolver.token_url(),
            clock,
        ));
        let token_source: Arc<dyn AccessTokenSource> = tokens.clone();
        let dispatcher = Dispatcher::new(http_client, resolver.clone(), token_source, &resilience);

        info!(
            "Gateway ready for region '{}' with {} configured services",
            resolver.code(),
            registry.configured_services().len()
        );

        Ok(Self {
            inner: Arc::new(GatewayInner {
                registry,
                resolver,
                tokens,
                dispatcher,
            }),
        })
    }

    pub fn crm(&self) -> CrmAdapter<'_> {
        CrmAdapter::new(&self.inner.dispatcher)
    }

    pub fn scheduling(&self) -> SchedulingAdapter<'_> {
        SchedulingAdapter::new(&self.inner.dispatcher)
    }

    pub fn file_storage(&self) -> FileStorageAdapter<'_> {
        FileStorageAdapter::new(&self.inner.dispatcher)
    }

    pub fn mailing_lists(&self) -> MailingListsAdapter<'_> {
        MailingListsAdapter::new(&self.inner.dispatcher)
    }

    pub fn projects(&self) -> ProjectsAdapter<'_> {
        ProjectsAdapter::new(&self.inner.dispatcher)
    }

    pub fn accounting(&self) -> AccountingAdapter<'_> {
        AccountingAdapter::new(&self.inner.dispatcher)
    }

    /// Send an arbitrary descriptor through the dispatcher
    pub async fn dispatch(&self, descriptor: RequestDescriptor) -> GatewayResult<ApiResponse> {
        self.inner.dispatcher.dispatch(descriptor).await
    }

    pub async fn access_token(&self, service: Service) -> GatewayResult<String> {
        self.inner.tokens.get_access_token(service).await
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.inner.tokens
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.inner.registry
    }

    pub fn resolver(&self) -> &RegionResolver {
        &self.inner.resolver
    }

    pub fn metrics(&self) -> &MetricsCollector {
        self.inner.dispatcher.metrics()
    }
}
