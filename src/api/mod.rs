//! Integration gateway for the platform's sub-APIs
//!
//! Per-service OAuth token caching, a resilient dispatcher that recovers from
//! 401 and 429 responses, region-aware base URLs and thin adapters for each
//! service, all reachable through [`Gateway`].

pub mod auth;
pub mod constants;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod models;
pub mod region;
pub mod request;
pub mod resilience;
pub mod services;

pub use auth::{AccessTokenSource, Clock, ManualClock, SystemClock, TokenCache};
pub use credentials::CredentialRegistry;
pub use dispatcher::Dispatcher;
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use models::{CredentialRecord, RegionConfig, Service, TokenInfo};
pub use region::{RegionResolver, builtin_region};
pub use request::{ApiResponse, MultipartFile, MultipartForm, Payload, RequestBody, RequestDescriptor, RequestOptions};
pub use resilience::{
    ApiLogger, LogLevel, MetricsCollector, MetricsSnapshot, MonitoringConfig, ResilienceConfig, RetryConfig,
    RetryPolicy,
};
