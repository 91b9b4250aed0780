use std::fmt;
use std::time::Instant;

use crate::ring::RingBitBuffer;

/// Represents the state of the circuit breaker.
///
/// Exactly one state is current at any time; transitions are serialized per
/// instance so every observer sees a single linear state history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitBreakerState {
    /// Calls are permitted and outcomes fill the closed ring buffer.
    Closed = 0,
    /// Calls are rejected until the open wait duration elapses.
    Open = 1,
    /// Probe calls are permitted; their outcomes decide recovery.
    HalfOpen = 2,
}

impl CircuitBreakerState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitBreakerState::Closed,
            1 => CircuitBreakerState::Open,
            2 => CircuitBreakerState::HalfOpen,
            _ => CircuitBreakerState::Closed,
        }
    }

    /// Stable textual form, also used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitBreakerState::Closed => "CLOSED",
            CircuitBreakerState::Open => "OPEN",
            CircuitBreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the ring buffer active for the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    /// Failure percentage over the active window, `-1.0` while it is not full.
    pub failure_rate: f32,
    /// Occupied slots in the active window.
    pub number_of_buffered_calls: usize,
    /// Failure slots in the active window.
    pub number_of_failed_calls: usize,
    /// Capacity of the active window.
    pub max_number_of_buffered_calls: usize,
}

/// The mutable half of a breaker, guarded by one mutex so automatic and
/// manual transitions interleave into a single observable order.
pub(crate) struct Machine {
    pub(crate) state: CircuitBreakerState,
    pub(crate) opened_at: Instant,
    pub(crate) closed_ring: RingBitBuffer,
    pub(crate) half_open_ring: RingBitBuffer,
}

impl Machine {
    pub(crate) fn new(closed_size: usize, half_open_size: usize) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            opened_at: Instant::now(),
            closed_ring: RingBitBuffer::new(closed_size),
            half_open_ring: RingBitBuffer::new(half_open_size),
        }
    }

    /// The ring that outcomes are currently recorded into. While open, the
    /// closed ring keeps accepting records; only the open timer gates calls.
    pub(crate) fn active_ring(&self) -> &RingBitBuffer {
        match self.state {
            CircuitBreakerState::HalfOpen => &self.half_open_ring,
            _ => &self.closed_ring,
        }
    }
}
