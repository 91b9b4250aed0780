//! Circuit breaker guard for synchronous and asynchronous call sites.
//!
//! A circuit breaker prevents cascading failures by tracking call outcomes in
//! a fixed-size sliding window of bits and short-circuiting callers once the
//! observed failure rate crosses a threshold.
//!
//! ## States
//! - **Closed**: normal operation, every call is permitted
//! - **Open**: calls are rejected until the open wait duration elapses
//! - **Half-open**: probe calls are permitted and their outcomes decide
//!   whether the circuit closes again or reopens
//!
//! The failure rate is only evaluated on a full window, so a breaker with a
//! closed window of 100 never trips on the first 99 outcomes regardless of
//! the failure mix.
//!
//! ## Example
//!
//! ```
//! use rampart_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), rampart_core::ConfigError> {
//! let config = CircuitBreakerConfig::builder()
//!     .failure_rate_threshold(50.0)
//!     .ring_buffer_size_in_closed_state(10)
//!     .wait_duration_in_open_state(Duration::from_secs(30))
//!     .build()?;
//! let breaker = CircuitBreaker::new("backend", config);
//!
//! let result = breaker.call(|| Ok::<_, std::io::Error>(42));
//! assert_eq!(result.unwrap(), 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//! - `tracing`: state transitions and rejections are logged with the
//!   `tracing` crate
//! - `metrics`: counters are recorded with the `metrics` facade

use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use rampart_core::EventBus;

pub use circuit::{CircuitBreakerMetrics, CircuitBreakerState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;
pub use ring::{RingBitBuffer, RingSnapshot};

mod circuit;
mod config;
mod error;
mod events;
mod registry;
mod ring;

use circuit::Machine;

/// A circuit breaker guarding one logical downstream dependency.
///
/// Cloning is cheap and every clone shares the same state, so a breaker can
/// be handed to any number of concurrent callers without external locking.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: CircuitBreakerConfig,
    // Mirror of the machine state for lock-free reads.
    state_tag: AtomicU8,
    machine: Mutex<Machine>,
    events: EventBus<CircuitBreakerEvent>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given name and configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let machine = Machine::new(
            config.ring_buffer_size_in_closed_state,
            config.ring_buffer_size_in_half_open_state,
        );
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                state_tag: AtomicU8::new(CircuitBreakerState::Closed as u8),
                machine: Mutex::new(machine),
                events: EventBus::new(),
            }),
        }
    }

    /// Creates a breaker with the default configuration.
    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Name of this instance, carried on every event.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    /// The event stream of this instance.
    pub fn events(&self) -> &EventBus<CircuitBreakerEvent> {
        &self.inner.events
    }

    /// Current state, readable without taking the machine lock.
    pub fn state(&self) -> CircuitBreakerState {
        CircuitBreakerState::from_u8(self.inner.state_tag.load(Ordering::Acquire))
    }

    /// Counters of the window active for the current state.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let machine = self.inner.machine.lock();
        let ring = machine.active_ring();
        CircuitBreakerMetrics {
            failure_rate: ring.failure_rate(),
            number_of_buffered_calls: ring.buffered_calls(),
            number_of_failed_calls: ring.failed_calls(),
            max_number_of_buffered_calls: ring.capacity(),
        }
    }

    /// Returns true if a call may proceed.
    ///
    /// While open this checks the open timer lazily: the first caller at or
    /// after `opened_at + wait_duration_in_open_state` performs the
    /// transition to half-open and is admitted as the first probe. A false
    /// return emits a [`CircuitBreakerEvent::NotPermitted`] event and the
    /// caller must not run the protected operation.
    pub fn is_call_permitted(&self) -> bool {
        let mut machine = self.inner.machine.lock();
        match machine.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => {
                if machine.opened_at.elapsed() >= self.inner.config.wait_duration_in_open_state {
                    self.transition(&mut machine, CircuitBreakerState::HalfOpen);
                    true
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(breaker = %self.inner.name, "call rejected, circuit open");
                    #[cfg(feature = "metrics")]
                    metrics::counter!(
                        "circuitbreaker_calls_not_permitted_total",
                        "circuitbreaker" => self.inner.name.clone()
                    )
                    .increment(1);
                    self.inner.events.emit(&CircuitBreakerEvent::NotPermitted {
                        name: self.inner.name.clone(),
                        created_at: SystemTime::now(),
                    });
                    false
                }
            }
            // Probes are not throttled here; the half-open window fill
            // decides the next transition.
            CircuitBreakerState::HalfOpen => true,
        }
    }

    /// Records a successful outcome.
    pub fn on_success(&self) {
        let mut machine = self.inner.machine.lock();
        self.inner.events.emit(&CircuitBreakerEvent::Success {
            name: self.inner.name.clone(),
            created_at: SystemTime::now(),
        });
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.inner.name.clone(),
            "outcome" => "success"
        )
        .increment(1);
        self.record_outcome(&mut machine, false);
    }

    /// Records an error outcome.
    ///
    /// `elapsed` is the duration of the protected call and is carried on the
    /// emitted event. Errors rejected by the configured failure predicate
    /// emit [`CircuitBreakerEvent::IgnoredError`] and leave the window and
    /// state untouched.
    pub fn on_error(&self, elapsed: Duration, error: &(dyn Error + 'static)) {
        let mut machine = self.inner.machine.lock();
        if !(self.inner.config.record_failure)(error) {
            self.inner.events.emit(&CircuitBreakerEvent::IgnoredError {
                name: self.inner.name.clone(),
                created_at: SystemTime::now(),
                error: error.to_string(),
            });
            return;
        }
        self.inner.events.emit(&CircuitBreakerEvent::Error {
            name: self.inner.name.clone(),
            created_at: SystemTime::now(),
            error: error.to_string(),
            elapsed,
        });
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.inner.name.clone(),
            "outcome" => "failure"
        )
        .increment(1);
        self.record_outcome(&mut machine, true);
    }

    /// Forces the circuit open.
    pub fn transition_to_open(&self) {
        let mut machine = self.inner.machine.lock();
        self.transition(&mut machine, CircuitBreakerState::Open);
    }

    /// Forces the circuit half-open.
    pub fn transition_to_half_open(&self) {
        let mut machine = self.inner.machine.lock();
        self.transition(&mut machine, CircuitBreakerState::HalfOpen);
    }

    /// Forces the circuit closed.
    pub fn transition_to_closed(&self) {
        let mut machine = self.inner.machine.lock();
        self.transition(&mut machine, CircuitBreakerState::Closed);
    }

    /// Runs `f` guarded by this breaker.
    ///
    /// Returns [`CircuitBreakerError::CallNotPermitted`] without running `f`
    /// when the circuit rejects the call; otherwise runs `f`, reports its
    /// outcome, and passes its error through as
    /// [`CircuitBreakerError::Inner`].
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        E: Error + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.is_call_permitted() {
            return Err(CircuitBreakerError::CallNotPermitted {
                name: self.inner.name.clone(),
            });
        }
        let start = Instant::now();
        match f() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_error(start.elapsed(), &error);
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    /// Async form of [`call`](Self::call).
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        E: Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.is_call_permitted() {
            return Err(CircuitBreakerError::CallNotPermitted {
                name: self.inner.name.clone(),
            });
        }
        let start = Instant::now();
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_error(start.elapsed(), &error);
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    fn record_outcome(&self, machine: &mut Machine, failure: bool) {
        match machine.state {
            // While open the closed window keeps filling; the open timer
            // alone decides when probing starts.
            CircuitBreakerState::Closed | CircuitBreakerState::Open => {
                let snapshot = machine.closed_ring.record(failure);
                if machine.state == CircuitBreakerState::Closed
                    && snapshot.buffered_calls == machine.closed_ring.capacity()
                {
                    let rate =
                        snapshot.failed_calls as f32 * 100.0 / snapshot.buffered_calls as f32;
                    if rate >= self.inner.config.failure_rate_threshold {
                        self.transition(machine, CircuitBreakerState::Open);
                    }
                }
            }
            CircuitBreakerState::HalfOpen => {
                let snapshot = machine.half_open_ring.record(failure);
                if snapshot.buffered_calls == machine.half_open_ring.capacity() {
                    let rate =
                        snapshot.failed_calls as f32 * 100.0 / snapshot.buffered_calls as f32;
                    if rate >= self.inner.config.failure_rate_threshold {
                        self.transition(machine, CircuitBreakerState::Open);
                    } else {
                        self.transition(machine, CircuitBreakerState::Closed);
                    }
                }
            }
        }
    }

    fn transition(&self, machine: &mut Machine, to: CircuitBreakerState) {
        if machine.state == to {
            return;
        }
        let from = machine.state;
        machine.state = to;
        self.inner.state_tag.store(to as u8, Ordering::Release);
        match to {
            CircuitBreakerState::Open => machine.opened_at = Instant::now(),
            CircuitBreakerState::HalfOpen => machine.half_open_ring.reset(),
            CircuitBreakerState::Closed => machine.closed_ring.reset(),
        }

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.inner.name, from = %from, to = %to, "circuit state transition");
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => self.inner.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);

        self.inner.events.emit(&CircuitBreakerEvent::StateTransition {
            name: self.inner.name.clone(),
            created_at: SystemTime::now(),
            from,
            to,
        });
    }
}

/// Wraps `f` so every invocation runs through `breaker`.
pub fn decorate<T, E, F>(
    breaker: CircuitBreaker,
    mut f: F,
) -> impl FnMut() -> Result<T, CircuitBreakerError<E>>
where
    E: Error + 'static,
    F: FnMut() -> Result<T, E>,
{
    move || breaker.call(&mut f)
}
