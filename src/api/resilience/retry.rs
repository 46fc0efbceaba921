//! Retry policy with exponential backoff
//!
//! One policy object decides what happens after every non-success response.
//! It is a list of rules, each made of a status predicate, a recovery action
//! and a backoff function, applied against a per-call retry budget.

use crate::api::constants;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts allowed per logical call
    pub retry_budget: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_budget: constants::DEFAULT_RETRY_BUDGET,
            base_delay: constants::DEFAULT_BACKOFF_BASE,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Conservative config for production
    pub fn conservative() -> Self {
        Self {
            retry_budget: 1,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Aggressive config for development/testing
    pub fn aggressive() -> Self {
        Self {
            retry_budget: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// What the dispatcher must do before trying again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Drop the cached token so the next attempt refreshes it
    InvalidateToken,
    /// Wait out the backoff delay
    Backoff,
}

/// Delay function applied before a retry
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Immediate,
    /// `base * multiplier^retries_used`, capped at `max`
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    pub fn delay(&self, retries_used: u32) -> Duration {
        match self {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Exponential {
                base,
                multiplier,
                max,
            } => {
                let delay_ms = (base.as_millis() as f64) * multiplier.powi(retries_used as i32);
                let delay = Duration::from_millis(delay_ms as u64);
                delay.min(*max)
            }
        }
    }
}

/// Which recoverable condition a rule handles; used to name the terminal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    Authentication,
    RateLimit,
}

#[derive(Debug, Clone)]
pub struct RetryRule {
    pub kind: RetryKind,
    pub matches: fn(u16) -> bool,
    pub action: RecoveryAction,
    pub backoff: Backoff,
}

/// Outcome of consulting the policy after a response
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Apply the action, wait `delay`, then try again
    Retry {
        kind: RetryKind,
        action: RecoveryAction,
        delay: Duration,
    },
    /// A rule matched but the budget is spent
    Exhausted(RetryKind),
    /// No rule covers this status
    NotRetryable,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    rules: Vec<RetryRule>,
    default_budget: u32,
}

impl RetryPolicy {
    /// Standard policy: 401 invalidates and retries at once, 429 backs off
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            rules: vec![
                RetryRule {
                    kind: RetryKind::Authentication,
                    matches: |status| status == 401,
                    action: RecoveryAction::InvalidateToken,
                    backoff: Backoff::Immediate,
                },
                RetryRule {
                    kind: RetryKind::RateLimit,
                    matches: |status| status == 429,
                    action: RecoveryAction::Backoff,
                    backoff: Backoff::Exponential {
                        base: config.base_delay,
                        multiplier: config.backoff_multiplier,
                        max: config.max_delay,
                    },
                },
            ],
            default_budget: config.retry_budget,
        }
    }

    pub fn with_rules(rules: Vec<RetryRule>, default_budget: u32) -> Self {
        Self {
            rules,
            default_budget,
        }
    }

    pub fn default_budget(&self) -> u32 {
        self.default_budget
    }

    /// Decide what to do after `status`, given retries already used and left
    pub fn decide(&self, status: u16, retries_used: u32, retries_left: u32) -> RetryDecision {
        let Some(rule) = self.rules.iter().find(|rule| (rule.matches)(status)) else {
            return RetryDecision::NotRetryable;
        };

        if retries_left == 0 {
            return RetryDecision::Exhausted(rule.kind);
        }

        RetryDecision::Retry {
            kind: rule.kind,
            action: rule.action,
            delay: rule.backoff.delay(retries_used),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
