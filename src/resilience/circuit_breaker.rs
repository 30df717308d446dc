//! Circuit breaker for calls to the remote model
//!
//! Implements the circuit breaker pattern to stop hammering a failing
//! dependency. One breaker belongs to one agent (or one batch run); nothing
//! here is global, so tests build fresh instances.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests allowed
    Closed,
    /// Too many failures - reject requests immediately
    Open,
    /// Testing recovery - exactly one trial request in flight
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// How a call was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed, ordinary call.
    Normal,
    /// The single recovery trial after the cooldown.
    Trial,
}

/// Fast rejection returned instead of making a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakerOpen {
    #[error("circuit breaker open, retry after {}s", .retry_after.as_secs_f64().ceil() as u64)]
    Cooling { retry_after: Duration },

    #[error("circuit breaker half-open, trial call already in flight")]
    TrialInFlight,
}

impl BreakerOpen {
    /// Time to wait before the breaker will consider another call.
    pub fn retry_after(&self) -> Duration {
        match self {
            BreakerOpen::Cooling { retry_after } => *retry_after,
            BreakerOpen::TrialInFlight => Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Tri-state failure gate
///
/// # States
///
/// - **Closed**: Normal operation, all requests allowed
/// - **Open**: Threshold reached, reject until `recovery_timeout` has passed
///   since the last failure
/// - **HalfOpen**: One trial request admitted; its outcome closes or reopens
///   the circuit
///
/// Every transition is a read-modify-write under one mutex.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// # Arguments
    ///
    /// * `threshold` - Number of consecutive failures before opening circuit
    /// * `recovery_timeout` - Cooldown before a half-open trial is admitted
    pub fn new(threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_started: None,
            }),
            threshold: threshold.max(1),
            recovery_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to make a call.
    ///
    /// Open turns into HalfOpen once the cooldown has elapsed and the caller
    /// gets [`Admission::Trial`]. Any other caller arriving while that trial
    /// is unresolved is rejected. A trial abandoned for longer than the
    /// recovery timeout (its caller was cancelled) is replaced by a new one.
    pub fn try_acquire(&self) -> Result<Admission, BreakerOpen> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or(self.recovery_timeout);
                if elapsed >= self.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_started = Some(now);
                    tracing::info!("circuit breaker half-open, admitting trial call");
                    Ok(Admission::Trial)
                } else {
                    Err(BreakerOpen::Cooling {
                        retry_after: self.recovery_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                let stale = inner
                    .trial_started
                    .is_none_or(|t| now.saturating_duration_since(t) >= self.recovery_timeout);
                if stale {
                    inner.trial_started = Some(now);
                    Ok(Admission::Trial)
                } else {
                    Err(BreakerOpen::TrialInFlight)
                }
            }
        }
    }

    /// Record a successful operation (resets failure count, closes circuit)
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(from = %inner.state, "circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.trial_started = None;
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.threshold => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    failures = inner.failure_count,
                    cooldown_secs = self.recovery_timeout.as_secs(),
                    "circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.trial_started = None;
                tracing::warn!("half-open trial failed, circuit breaker reopened");
            }
            _ => {}
        }
    }

    /// Current state (for monitoring)
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current consecutive failure count (for monitoring)
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time until a trial will be admitted, zero unless open
    pub fn time_until_retry(&self) -> Duration {
        let inner = self.lock();
        match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(t)) => self
                .recovery_timeout
                .saturating_sub(Instant::now().saturating_duration_since(t)),
            _ => Duration::ZERO,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}
