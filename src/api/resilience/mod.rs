//! Production resilience features
//!
//! Provides the retry policy, per-call deadlines and monitoring for
//! gateway calls.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use metrics::{GlobalMetrics, MetricsCollector, MetricsSnapshot, ServiceMetrics};
pub use retry::{Backoff, RecoveryAction, RetryConfig, RetryDecision, RetryKind, RetryPolicy, RetryRule};
