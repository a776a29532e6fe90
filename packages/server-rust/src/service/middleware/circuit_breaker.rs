//! Circuit breaking middleware.
//!
//! State machine per breaker:
//!
//! - `Closed`: calls pass through; consecutive failures are counted and the
//!   breaker opens once `failure_threshold` is reached.
//! - `Open`: calls fail immediately with `OperationError::CircuitOpen`
//!   without reaching the wrapped endpoint, until `open_timeout` elapses.
//! - `HalfOpen`: exactly one probe call is let through. Success closes the
//!   breaker, failure re-opens it. Other calls are rejected while the probe
//!   is in flight.
//!
//! Each admitted call carries the breaker generation it was admitted under.
//! Outcomes from an older generation are dropped, so only the probe decides
//! how HALF_OPEN ends. A cancelled or rate-limited probe frees the slot for
//! the next call.

use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::time::Instant;
use tower::{Layer, Service};
use usersvc_core::{Call, Operation};

use crate::service::config::CircuitBreakerConfig;
use crate::service::operation::{BoxedFuture, OperationError};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    /// `probe_started` is `None` while the probe slot is free.
    HalfOpen { probe_started: Option<Instant> },
}

/// Ticket handed to an admitted call. Only outcomes whose generation matches
/// the breaker's current one may move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Admission {
    generation: u64,
    probe: bool,
}

#[derive(Debug)]
struct Breaker {
    name: String,
    config: CircuitBreakerConfig,
    state: BreakerState,
    /// Bumped on every state transition and every probe admission.
    generation: u64,
}

impl Breaker {
    fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                open_timeout: config.open_timeout,
            },
            state: BreakerState::Closed {
                consecutive_failures: 0,
            },
            generation: 0,
        }
    }

    fn transition(&mut self, state: BreakerState) {
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }

    fn admit_probe(&mut self, now: Instant) -> Admission {
        self.transition(BreakerState::HalfOpen {
            probe_started: Some(now),
        });
        Admission {
            generation: self.generation,
            probe: true,
        }
    }

    /// Decides whether a call may proceed, moving OPEN to HALF_OPEN once the
    /// timeout has elapsed.
    fn admit(&mut self, now: Instant) -> Option<Admission> {
        match self.state {
            BreakerState::Closed { .. } => Some(Admission {
                generation: self.generation,
                probe: false,
            }),
            BreakerState::Open { opened_at } if now >= opened_at + self.config.open_timeout => {
                tracing::info!(breaker = %self.name, "circuit half-open, sending probe");
                Some(self.admit_probe(now))
            }
            BreakerState::Open { .. } => None,
            BreakerState::HalfOpen {
                probe_started: None,
            } => Some(self.admit_probe(now)),
            // A probe whose future was dropped never reports back; let a new
            // one through after another timeout.
            BreakerState::HalfOpen {
                probe_started: Some(started),
            } if now >= started + self.config.open_timeout => Some(self.admit_probe(now)),
            BreakerState::HalfOpen { .. } => None,
        }
    }

    fn is_current(&self, admission: Admission) -> bool {
        admission.generation == self.generation
    }

    fn record_success(&mut self, admission: Admission) {
        if !self.is_current(admission) {
            return;
        }
        match self.state {
            BreakerState::HalfOpen { .. } => {
                tracing::info!(breaker = %self.name, "circuit closed");
                self.transition(BreakerState::Closed {
                    consecutive_failures: 0,
                });
            }
            BreakerState::Closed { .. } => {
                self.state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    fn record_failure(&mut self, admission: Admission, now: Instant) {
        if !self.is_current(admission) {
            return;
        }
        match self.state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures.saturating_add(1);
                if failures >= self.config.failure_threshold {
                    tracing::warn!(breaker = %self.name, failures, "circuit opened");
                    self.transition(BreakerState::Open { opened_at: now });
                } else {
                    self.state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            BreakerState::HalfOpen { .. } => {
                tracing::warn!(breaker = %self.name, "probe failed, circuit re-opened");
                self.transition(BreakerState::Open { opened_at: now });
            }
            BreakerState::Open { .. } => {}
        }
    }

    /// An outcome that says nothing about the downstream. A probe that ends
    /// this way gives its slot back.
    fn release(&mut self, admission: Admission) {
        if admission.probe && self.is_current(admission) {
            self.state = BreakerState::HalfOpen {
                probe_started: None,
            };
        }
    }

    fn observable(&self) -> CircuitState {
        match self.state {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { .. } => CircuitState::Open,
            BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

// ---------------------------------------------------------------------------
// CircuitBreakerLayer
// ---------------------------------------------------------------------------

/// Tower layer holding one breaker. Build one layer per endpoint so each
/// endpoint trips independently.
#[derive(Debug, Clone)]
pub struct CircuitBreakerLayer {
    breaker: Arc<Mutex<Breaker>>,
}

impl CircuitBreakerLayer {
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            breaker: Arc::new(Mutex::new(Breaker::new(name.into(), config))),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.breaker.lock().observable()
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: Arc::clone(&self.breaker),
        }
    }
}

// ---------------------------------------------------------------------------
// CircuitBreakerService
// ---------------------------------------------------------------------------

/// Service wrapper that short-circuits calls while its breaker is open.
#[derive(Debug, Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: Arc<Mutex<Breaker>>,
}

impl<S, R> Service<Call<R>> for CircuitBreakerService<S>
where
    R: Operation,
    S: Service<Call<R>, Response = R::Response, Error = OperationError>,
    S::Future: Send + 'static,
{
    type Response = R::Response;
    type Error = OperationError;
    type Future = BoxedFuture<R::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let admission = {
            let mut breaker = self.breaker.lock();
            match breaker.admit(Instant::now()) {
                Some(admission) => admission,
                None => {
                    let name = breaker.name.clone();
                    return Box::pin(async move { Err(OperationError::CircuitOpen { name }) });
                }
            }
        };

        let breaker = Arc::clone(&self.breaker);
        let fut = self.inner.call(call);
        Box::pin(async move {
            let result = fut.await;
            match &result {
                Ok(_) => breaker.lock().record_success(admission),
                Err(e) if e.counts_as_failure() => {
                    breaker.lock().record_failure(admission, Instant::now());
                }
                Err(_) => breaker.lock().release(admission),
            }
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
