//! Performance metrics for gateway calls
//!
//! Aggregates call counts, durations, retries and status codes per service
//! and across the whole gateway.

use super::config::MonitoringConfig;
use super::logging::OperationMetrics;
use crate::api::models::Service;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
    config: MonitoringConfig,
}

#[derive(Debug)]
struct MetricsCollectorInner {
    services: HashMap<Service, ServiceMetrics>,
    global: GlobalMetrics,
    start_time: Instant,
}

/// Metrics for one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetrics {
    pub service: Service,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub total_retries: u64,
    pub total_backoff: Duration,
    pub status_codes: BTreeMap<u16, u64>,
    pub error_categories: BTreeMap<String, u64>,
}

/// Metrics across all services
#[derive(Debug, Clone, Serialize)]
pub struct GlobalMetrics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub calls_per_second: f64,
    pub average_duration: Duration,
    pub error_rate: f64,
    pub total_backoff: Duration,
    pub uptime: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub global: GlobalMetrics,
    pub services: Vec<ServiceMetrics>,
    pub timestamp: String,
}

impl MetricsCollector {
    pub fn new(config: MonitoringConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsCollectorInner {
                services: HashMap::new(),
                global: GlobalMetrics::new(),
                start_time: Instant::now(),
            })),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record completion of a logical call
    pub fn record_operation(&self, service: Service, metrics: &OperationMetrics) {
        if !self.config.performance_metrics {
            return;
        }

        let mut inner = self.lock();
        let uptime = inner.start_time.elapsed();

        inner
            .services
            .entry(service)
            .or_insert_with(|| ServiceMetrics::new(service))
            .record_operation(metrics);

        inner.global.record_operation(metrics, uptime);
    }

    /// Recount one already-recorded successful call as failed
    pub fn record_rejected_response(&self, service: Service, category: &str) {
        if !self.config.performance_metrics {
            return;
        }

        let mut inner = self.lock();
        if let Some(metrics) = inner.services.get_mut(&service) {
            metrics.successful_calls = metrics.successful_calls.saturating_sub(1);
            metrics.failed_calls += 1;
            *metrics.error_categories.entry(category.to_string()).or_insert(0) += 1;
        }
        inner.global.record_rejection();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        let mut services: Vec<_> = inner.services.values().cloned().collect();
        services.sort_by_key(|metrics| metrics.service);

        MetricsSnapshot {
            global: inner.global.clone(),
            services,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn service_metrics(&self, service: Service) -> Option<ServiceMetrics> {
        self.lock().services.get(&service).cloned()
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.services.clear();
        inner.global = GlobalMetrics::new();
        inner.start_time = Instant::now();
    }
}

impl ServiceMetrics {
    fn new(service: Service) -> Self {
        Self {
            service,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            total_retries: 0,
            total_backoff: Duration::ZERO,
            status_codes: BTreeMap::new(),
            error_categories: BTreeMap::new(),
        }
    }

    fn record_operation(&mut self, metrics: &OperationMetrics) {
        self.total_calls += 1;

        if metrics.success {
            self.successful_calls += 1;
        } else {
            self.failed_calls += 1;
        }

        self.total_duration += metrics.duration;
        self.min_duration = self.min_duration.min(metrics.duration);
        self.max_duration = self.max_duration.max(metrics.duration);
        self.total_retries += metrics.retries() as u64;
        self.total_backoff += metrics.total_backoff();

        if let Some(status_code) = metrics.status_code {
            *self.status_codes.entry(status_code).or_insert(0) += 1;
        }
        if let Some(category) = metrics.error_category {
            *self.error_categories.entry(category.to_string()).or_insert(0) += 1;
        }
    }

    /// Success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.successful_calls as f64 / self.total_calls as f64) * 100.0
        }
    }

    pub fn average_duration(&self) -> Duration {
        if self.total_calls == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total_calls as u32
        }
    }
}

impl GlobalMetrics {
    fn new() -> Self {
        Self {
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            calls_per_second: 0.0,
            average_duration: Duration::ZERO,
            error_rate: 0.0,
            total_backoff: Duration::ZERO,
            uptime: Duration::ZERO,
        }
    }

    fn record_rejection(&mut self) {
        self.successful_calls = self.successful_calls.saturating_sub(1);
        self.failed_calls += 1;
        if self.total_calls > 0 {
            self.error_rate = (self.failed_calls as f64 / self.total_calls as f64) * 100.0;
        }
    }

    fn record_operation(&mut self, metrics: &OperationMetrics, uptime: Duration) {
        self.total_calls += 1;
        self.uptime = uptime;

        if metrics.success {
            self.successful_calls += 1;
        } else {
            self.failed_calls += 1;
        }

        // Running average
        let new_avg_ms = ((self.average_duration.as_millis() as u64 * (self.total_calls - 1))
            + metrics.duration.as_millis() as u64)
            / self.total_calls;
        self.average_duration = Duration::from_millis(new_avg_ms);

        if uptime.as_secs() > 0 {
            self.calls_per_second = self.total_calls as f64 / uptime.as_secs_f64();
        }

        self.error_rate = (self.failed_calls as f64 / self.total_calls as f64) * 100.0;
        self.total_backoff += metrics.total_backoff();
    }
}
