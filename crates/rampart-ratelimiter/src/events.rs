use std::time::SystemTime;

use rampart_core::GuardEvent;

/// Why an acquire attempt produced no permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAcquireReason {
    /// The required wait exceeded the caller's timeout.
    Timeout,
    /// The caller was cancelled while waiting for its reservation.
    Cancelled,
}

/// Events emitted by a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permission was acquired.
    SuccessfulAcquire {
        name: String,
        created_at: SystemTime,
        /// How long the caller waited for the permission to become valid.
        nanos_waited: u64,
    },
    /// No permission was acquired.
    FailedAcquire {
        name: String,
        created_at: SystemTime,
        reason: FailedAcquireReason,
    },
}

impl GuardEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::SuccessfulAcquire { .. } => "SuccessfulAcquire",
            RateLimiterEvent::FailedAcquire { .. } => "FailedAcquire",
        }
    }

    fn created_at(&self) -> SystemTime {
        match self {
            RateLimiterEvent::SuccessfulAcquire { created_at, .. }
            | RateLimiterEvent::FailedAcquire { created_at, .. } => *created_at,
        }
    }

    fn guard_name(&self) -> &str {
        match self {
            RateLimiterEvent::SuccessfulAcquire { name, .. }
            | RateLimiterEvent::FailedAcquire { name, .. } => name,
        }
    }
}
