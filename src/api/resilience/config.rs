//! Resilience configuration with builder pattern
//!
//! Provides a unified configuration for the retry policy, per-call deadlines
//! and monitoring with sane defaults.

use super::retry::RetryConfig;
use std::time::Duration;

/// Global resilience configuration for gateway calls
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub monitoring: MonitoringConfig,
    /// Default deadline for one logical call when the caller supplies none
    pub call_timeout: Option<Duration>,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub request_logging: bool,
    pub performance_metrics: bool,
    pub log_level: LogLevel,
    /// Operations slower than this are reported as a performance warning
    pub slow_call_threshold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => anyhow::bail!("Unknown log level '{}'", other),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            monitoring: MonitoringConfig::default(),
            call_timeout: Some(Duration::from_secs(60)),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
            slow_call_threshold: Duration::from_secs(5),
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Conservative config for production portals
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            monitoring: MonitoringConfig {
                log_level: LogLevel::Warn, // Less verbose in production
                ..MonitoringConfig::default()
            },
            call_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Aggressive config for development against sandboxes
    pub fn development() -> Self {
        Self {
            retry: RetryConfig::aggressive(),
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
                ..MonitoringConfig::default()
            },
            call_timeout: Some(Duration::from_secs(120)),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// No retries, no deadline, no monitoring (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                retry_budget: 0,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                backoff_multiplier: 2.0,
            },
            monitoring: MonitoringConfig {
                request_logging: false,
                performance_metrics: false,
                log_level: LogLevel::Error,
                slow_call_threshold: Duration::MAX,
            },
            call_timeout: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the default retry budget per logical call
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.config.retry.retry_budget = budget;
        self
    }

    /// Set the first 429 backoff delay
    pub fn backoff_base(mut self, delay: std::time::Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set the default per-call deadline
    pub fn call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Configure monitoring
    pub fn monitoring_config(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    /// Enable/disable request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Enable/disable performance metrics
    pub fn performance_metrics(mut self, enabled: bool) -> Self {
        self.config.monitoring.performance_metrics = enabled;
        self
    }

    /// Set logging level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResilienceConfig::default();

        assert_eq!(config.retry.retry_budget, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(600));
        assert_eq!(config.call_timeout, Some(Duration::from_secs(60)));
        assert!(config.monitoring.request_logging);
    }

    #[test]
    fn test_conservative_config() {
        let config = ResilienceConfig::conservative();

        assert_eq!(config.retry.retry_budget, 1);
        assert_eq!(config.monitoring.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_disabled_config() {
        let config = ResilienceConfig::disabled();

        assert_eq!(config.retry.retry_budget, 0);
        assert!(config.call_timeout.is_none());
        assert!(!config.monitoring.request_logging);
        assert!(!config.monitoring.performance_metrics);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ResilienceConfig::builder()
            .retry_budget(5)
            .backoff_base(Duration::from_millis(10))
            .call_timeout(Some(Duration::from_secs(3)))
            .log_level(LogLevel::Debug)
            .build();

        assert_eq!(config.retry.retry_budget, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.call_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
