//! Structured logging with correlation tracking for gateway calls
//!
//! Every line carries the service and correlation id so one logical call can
//! be followed across attempts, token refreshes and retries.

use super::config::{LogLevel, MonitoringConfig};
use crate::api::error::GatewayError;
use crate::api::models::Service;
use log::{debug, error, info, trace, warn};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Structured logger for gateway operations
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single logical call
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    pub service: Service,
    /// Method and path, e.g. `POST /Leads/upsert`
    pub operation: String,
    pub metadata: HashMap<String, Value>,
    pub start_time: Instant,
}

/// Outcome of a logical call
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    /// Network attempts made, including the first
    pub attempts: u32,
    pub success: bool,
    pub status_code: Option<u16>,
    /// Error category when the call failed
    pub error_category: Option<&'static str>,
    pub backoff_delays: Vec<Duration>,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Start tracking a new logical call
    pub fn start_operation(&self, service: Service, operation: &str, correlation_id: &str) -> OperationContext {
        let context = OperationContext {
            correlation_id: correlation_id.to_string(),
            service,
            operation: operation.to_string(),
            metadata: HashMap::new(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "service": service.as_str(),
                "operation": context.operation,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            debug!("Gateway Operation Started: {}", log_data);
        }

        context
    }

    /// Log one outbound attempt
    pub fn log_request(&self, context: &OperationContext, attempt: u32, method: &str, url: &str, headers: &HashMap<String, String>) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "attempt": attempt,
            "method": method,
            "url": url,
            "headers": sanitize_headers(headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    /// Log the response to one attempt
    pub fn log_response(&self, context: &OperationContext, attempt: u32, status_code: u16, duration: Duration) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "attempt": attempt,
            "status_code": status_code,
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Response: {}", log_data);
    }

    /// Log a retry about to happen
    pub fn log_retry(&self, context: &OperationContext, attempt: u32, reason: &str, delay: Duration) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_attempt",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "operation": context.operation,
            "attempt": attempt,
            "reason": reason,
            "delay_ms": delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Retry Attempt: {}", log_data);
    }

    /// Log a failure before it is returned; never gated by configuration
    pub fn log_failure(&self, context: &OperationContext, err: &GatewayError) {
        let log_data = json!({
            "event": "operation_failed",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "operation": context.operation,
            "category": err.category(),
            "status_code": err.status(),
            "error": err.to_string(),
            "duration_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        error!("Gateway Operation Failed: {}", log_data);
    }

    /// Complete a call and log its metrics
    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        if metrics.is_slow(self.config.slow_call_threshold) {
            self.log_performance_warning(context, metrics.duration);
        }

        if !self.config.performance_metrics || !self.should_log(LogLevel::Info) || !metrics.success {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "operation": context.operation,
            "duration_ms": metrics.duration.as_millis(),
            "attempts": metrics.attempts,
            "status_code": metrics.status_code,
            "backoff_delays_ms": metrics.backoff_delays.iter().map(|d| d.as_millis()).collect::<Vec<_>>(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        info!("Gateway Operation Completed: {}", log_data);
    }

    pub fn add_metadata(&self, context: &mut OperationContext, key: &str, value: Value) {
        if self.should_log(LogLevel::Trace) {
            trace!("Added metadata to operation {}: {} = {}", context.correlation_id, key, value);
        }

        context.metadata.insert(key.to_string(), value);
    }

    fn log_performance_warning(&self, context: &OperationContext, duration: Duration) {
        if !self.config.performance_metrics || !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "performance_warning",
            "correlation_id": context.correlation_id,
            "service": context.service.as_str(),
            "operation": context.operation,
            "duration_ms": duration.as_millis(),
            "threshold_ms": self.config.slow_call_threshold.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Slow Operation Detected: {}", log_data);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

/// Redact credentials from headers before they reach a log line
pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            if key_lower.contains("authorization") || key_lower.contains("token") || key_lower.contains("key") {
                (key.clone(), "[REDACTED]".to_string())
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(&self, attempts: u32, status_code: Option<u16>, error: Option<&GatewayError>) -> OperationMetrics {
        OperationMetrics {
            duration: self.elapsed(),
            attempts,
            success: error.is_none(),
            status_code,
            error_category: error.map(|e| e.category()),
            backoff_delays: Vec::new(),
        }
    }
}

impl OperationMetrics {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn total_backoff(&self) -> Duration {
        self.backoff_delays.iter().sum()
    }

    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.duration > threshold
    }
}
