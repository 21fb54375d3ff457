//! Per-backend circuit breaker
//!
//! The state machine lives in [`BreakerCore`] as plain transitions that take
//! the current instant as an argument. [`CircuitBreaker`] wraps it with a
//! mutex and runs the operation between `admit` and `record_*`; the lock is
//! never held across the operation itself.
//!
//! ```text
//!            failure_count >= threshold
//!   Closed ─────────────────────────────▶ Open
//!     ▲                                   │  ▲
//!     │ trial ok        recovery_timeout  │  │ trial failed
//!     │                    elapsed        ▼  │
//!     └──────────────────────────────── HalfOpen
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult, UnavailableReason};

/// Default consecutive failures before the breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default time an open breaker waits before probing
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Decides whether an error counts against the backend
pub type FailureClassifier = fn(&GatewayError) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through
    Closed,
    /// Calls fail fast
    Open,
    /// Calls pass through as trials; one failure reopens
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        write!(f, "{}", s)
    }
}

/// Breaker tuning, fixed per backend at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

/// Outcome of asking the breaker for permission to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed: run the operation
    Allowed,
    /// Half-open: run the operation as a trial call
    Trial,
    /// Open and still cooling down: do not run the operation
    Rejected,
}

/// A state change, reported so callers can log it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// The breaker state machine, free of locking and I/O
#[derive(Debug, Clone)]
pub struct BreakerCore {
    config: BreakerConfig,
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    trips: u64,
}

impl BreakerCore {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
            trips: 0,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Number of times the breaker has opened
    pub fn trips(&self) -> u64 {
        self.trips
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Decide whether a call may proceed at `now`.
    ///
    /// An open breaker whose recovery timeout has strictly elapsed moves to
    /// half-open and admits this same call as a trial.
    pub fn admit(&mut self, now: Instant) -> (Admission, Option<Transition>) {
        match self.state {
            BreakerState::Closed => (Admission::Allowed, None),
            BreakerState::HalfOpen => (Admission::Trial, None),
            BreakerState::Open => {
                let cooled_down = match self.last_failure {
                    Some(at) => now.saturating_duration_since(at) > self.config.recovery_timeout,
                    None => true,
                };
                if cooled_down {
                    (Admission::Trial, self.move_to(BreakerState::HalfOpen))
                } else {
                    (Admission::Rejected, None)
                }
            }
        }
    }

    /// Record a successful call.
    ///
    /// Results that arrive while the breaker is open belong to calls admitted
    /// before it opened and are ignored.
    pub fn record_success(&mut self) -> Option<Transition> {
        match self.state {
            BreakerState::Closed => {
                self.failure_count = 0;
                None
            }
            BreakerState::HalfOpen => {
                self.failure_count = 0;
                self.move_to(BreakerState::Closed)
            }
            BreakerState::Open => None,
        }
    }

    /// Record a call that failed in a way that counts against the backend
    pub fn record_failure(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            BreakerState::Closed => {
                self.note_failure(now);
                if self.failure_count >= self.config.failure_threshold {
                    self.move_to(BreakerState::Open)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                self.note_failure(now);
                self.move_to(BreakerState::Open)
            }
            BreakerState::Open => None,
        }
    }

    fn note_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);
        self.last_failure_at = Some(Utc::now());
    }

    fn move_to(&mut self, to: BreakerState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        if to == BreakerState::Open {
            self.trips += 1;
        }
        Some(Transition { from, to })
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub backend: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Times the breaker has opened since creation
    pub trips: u64,
}

/// Circuit breaker guarding one backend
pub struct CircuitBreaker {
    backend: String,
    core: Mutex<BreakerCore>,
    classifier: FailureClassifier,
}

impl CircuitBreaker {
    pub fn new(backend: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            backend: backend.into(),
            core: Mutex::new(BreakerCore::new(config)),
            classifier: GatewayError::is_transport_failure,
        }
    }

    /// Replace the rule deciding which errors count as backend failures
    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> BreakerState {
        self.core.lock().state()
    }

    pub fn failure_count(&self) -> u32 {
        self.core.lock().failure_count()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.core.lock();
        BreakerSnapshot {
            backend: self.backend.clone(),
            state: core.state,
            failure_count: core.failure_count,
            failure_threshold: core.config.failure_threshold,
            recovery_timeout_ms: core.config.recovery_timeout.as_millis() as u64,
            last_failure_at: core.last_failure_at,
            trips: core.trips,
        }
    }

    /// Run `operation` if the breaker admits it.
    ///
    /// A rejected call returns `BackendUnavailable` with
    /// [`UnavailableReason::BreakerOpen`] and never invokes `operation`.
    /// Errors the classifier does not accept are returned unchanged and
    /// leave the breaker untouched.
    pub async fn call<T, F, Fut>(&self, operation: F) -> GatewayResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let (admission, transition) = self.core.lock().admit(Instant::now());
        self.log_transition(transition);

        if admission == Admission::Rejected {
            debug!(backend = %self.backend, "Circuit open, failing fast");
            return Err(GatewayError::BackendUnavailable {
                backend: self.backend.clone(),
                reason: UnavailableReason::BreakerOpen,
            });
        }

        let result = operation().await;

        let transition = match &result {
            Ok(_) => self.core.lock().record_success(),
            Err(e) if (self.classifier)(e) => {
                debug!(backend = %self.backend, error = %e, "Call failed against breaker");
                self.core.lock().record_failure(Instant::now())
            }
            Err(_) => None,
        };
        self.log_transition(transition);

        result
    }

    fn log_transition(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        match to {
            BreakerState::Open => {
                warn!(backend = %self.backend, %from, %to, "Circuit breaker opened")
            }
            _ => info!(backend = %self.backend, %from, %to, "Circuit breaker transition"),
        }
    }
}

/// One breaker per backend name, created on first use
pub struct BreakerSet {
    defaults: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    classifier: FailureClassifier,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerSet {
    pub fn new(defaults: BreakerConfig) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            classifier: GatewayError::is_transport_failure,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Use `config` instead of the defaults for `backend`
    pub fn with_override(mut self, backend: impl Into<String>, config: BreakerConfig) -> Self {
        self.overrides.insert(backend.into(), config);
        self
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Configuration that applies to `backend`
    pub fn config_for(&self, backend: &str) -> BreakerConfig {
        self.overrides.get(backend).copied().unwrap_or(self.defaults)
    }

    /// The breaker for `backend`, created atomically if missing
    pub fn get(&self, backend: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(backend.to_string())
            .or_insert_with(|| {
                debug!(backend = %backend, "Creating circuit breaker");
                Arc::new(
                    CircuitBreaker::new(backend, self.config_for(backend))
                        .with_classifier(self.classifier),
                )
            })
            .clone()
    }

    /// Snapshots of every breaker created so far, sorted by backend
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .lock()
            .values()
            .map(|b| b.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.backend.cmp(&b.backend));
        snapshots
    }
}

impl Default for BreakerSet {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
