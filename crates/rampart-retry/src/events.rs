use std::time::{Duration, SystemTime};

use rampart_core::GuardEvent;

/// Events emitted by a retry instance.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and will be retried after `wait`.
    Retry {
        name: String,
        created_at: SystemTime,
        /// Number of attempts made so far.
        attempt: u32,
        /// Rendered form of the failed attempt's error; absent when the
        /// retry was triggered by the result predicate.
        error: Option<String>,
        /// Wait before the next attempt.
        wait: Duration,
    },
    /// The operation succeeded after at least one retry.
    Success {
        name: String,
        created_at: SystemTime,
        attempts: u32,
    },
    /// The operation failed after exhausting all attempts.
    Error {
        name: String,
        created_at: SystemTime,
        attempts: u32,
        error: String,
    },
    /// An error was not retried because the retry predicate rejected it.
    IgnoredError {
        name: String,
        created_at: SystemTime,
        error: String,
    },
}

impl GuardEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Error { .. } => "Error",
            RetryEvent::IgnoredError { .. } => "IgnoredError",
        }
    }

    fn created_at(&self) -> SystemTime {
        match self {
            RetryEvent::Retry { created_at, .. }
            | RetryEvent::Success { created_at, .. }
            | RetryEvent::Error { created_at, .. }
            | RetryEvent::IgnoredError { created_at, .. } => *created_at,
        }
    }

    fn guard_name(&self) -> &str {
        match self {
            RetryEvent::Retry { name, .. }
            | RetryEvent::Success { name, .. }
            | RetryEvent::Error { name, .. }
            | RetryEvent::IgnoredError { name, .. } => name,
        }
    }
}
