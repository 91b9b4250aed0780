use std::time::{Duration, SystemTime};

use rampart_core::GuardEvent;

use crate::circuit::CircuitBreakerState;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A successful outcome was recorded.
    Success {
        name: String,
        created_at: SystemTime,
    },
    /// A failure outcome was recorded.
    Error {
        name: String,
        created_at: SystemTime,
        /// Rendered form of the underlying error.
        error: String,
        /// Duration of the protected call that failed.
        elapsed: Duration,
    },
    /// An error was reported but rejected by the failure predicate.
    IgnoredError {
        name: String,
        created_at: SystemTime,
        error: String,
    },
    /// The breaker moved from one state to another.
    StateTransition {
        name: String,
        created_at: SystemTime,
        from: CircuitBreakerState,
        to: CircuitBreakerState,
    },
    /// A call was rejected because the circuit does not permit calls.
    NotPermitted {
        name: String,
        created_at: SystemTime,
    },
}

impl GuardEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::Success { .. } => "Success",
            CircuitBreakerEvent::Error { .. } => "Error",
            CircuitBreakerEvent::IgnoredError { .. } => "IgnoredError",
            CircuitBreakerEvent::StateTransition { .. } => "StateTransition",
            CircuitBreakerEvent::NotPermitted { .. } => "NotPermitted",
        }
    }

    fn created_at(&self) -> SystemTime {
        match self {
            CircuitBreakerEvent::Success { created_at, .. }
            | CircuitBreakerEvent::Error { created_at, .. }
            | CircuitBreakerEvent::IgnoredError { created_at, .. }
            | CircuitBreakerEvent::StateTransition { created_at, .. }
            | CircuitBreakerEvent::NotPermitted { created_at, .. } => *created_at,
        }
    }

    fn guard_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::Success { name, .. }
            | CircuitBreakerEvent::Error { name, .. }
            | CircuitBreakerEvent::IgnoredError { name, .. }
            | CircuitBreakerEvent::StateTransition { name, .. }
            | CircuitBreakerEvent::NotPermitted { name, .. } => name,
        }
    }
}
