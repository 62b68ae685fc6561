//! Circuit Breaker pattern implementation.
//!
//! Stops polling a device after a streak of failed cycles so a broken or
//! locked-out modem is not hammered with logins.
//!
//! - Closed: polls run normally, failures are counted.
//! - Open: polls fail fast with `CircuitOpen` and perform no I/O.
//! - Half-open: the cooldown has passed; the next poll is a trial. Success
//!   closes the circuit, failure reopens it for another cooldown.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, AuthFailureKind, Result};
use crate::models::CircuitConfig;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed polls before the circuit opens. Default: 5
    pub failure_threshold: u32,
    /// Time the circuit stays open. Default: 5 minutes
    pub cooldown: Duration,
    /// Open at once when a device reports a lockout
    pub trip_on_lockout: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitConfig::default())
    }
}

impl From<&CircuitConfig> for CircuitBreakerConfig {
    fn from(config: &CircuitConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
            trip_on_lockout: config.trip_on_lockout,
        }
    }
}

/// Result of a circuit breaker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitBreakerResult {
    /// Polling allowed
    Closed { consecutive_failures: u32 },
    /// Cooldown elapsed, one trial poll allowed
    HalfOpen,
    /// Polling paused
    Open { retry_in: Duration },
}

/// Per-target failure tracker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Current state. Does not change anything.
    pub fn check(&self) -> CircuitBreakerResult {
        match self.opened_at {
            None => CircuitBreakerResult::Closed {
                consecutive_failures: self.consecutive_failures,
            },
            Some(opened_at) => {
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.cooldown {
                    CircuitBreakerResult::HalfOpen
                } else {
                    CircuitBreakerResult::Open {
                        retry_in: self.config.cooldown - elapsed,
                    }
                }
            }
        }
    }

    /// Ok if a poll may run now, `CircuitOpen` otherwise.
    pub fn validate(&self) -> Result<()> {
        match self.check() {
            CircuitBreakerResult::Closed { .. } => Ok(()),
            CircuitBreakerResult::HalfOpen => {
                log::info!(
                    "Circuit breaker: HALF-OPEN after {} failures, allowing a trial poll",
                    self.consecutive_failures
                );
                Ok(())
            }
            CircuitBreakerResult::Open { retry_in } => {
                log::debug!("Circuit breaker: OPEN, retry in {}s", retry_in.as_secs());
                Err(AppError::CircuitOpen { retry_in })
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.opened_at.is_some() || self.consecutive_failures > 0 {
            log::info!(
                "Circuit breaker: CLOSED after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Count a failed poll. Errors that say nothing about the device
    /// (cancellation, an already open circuit) are ignored.
    pub fn record_failure(&mut self, error: &AppError) {
        if !error.counts_as_poll_failure() {
            return;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let lockout = error.auth_kind() == Some(AuthFailureKind::LockedOut);
        let half_open_trial = self.opened_at.is_some();
        if half_open_trial
            || (lockout && self.config.trip_on_lockout)
            || self.consecutive_failures >= self.config.failure_threshold
        {
            log::error!(
                "Circuit breaker: OPEN after {} consecutive failures ({}), cooling down {}s",
                self.consecutive_failures,
                error,
                self.config.cooldown.as_secs()
            );
            self.opened_at = Some(Instant::now());
        } else {
            log::warn!(
                "Poll failure {}/{}: {}",
                self.consecutive_failures,
                self.config.failure_threshold,
                error
            );
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
