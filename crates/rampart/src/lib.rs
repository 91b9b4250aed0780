//! Composable fault-tolerance guards for synchronous and asynchronous call
//! sites.
//!
//! Three independent guards share a common shape: each exposes a small
//! decision API consulted around a protected operation, keeps its own
//! concurrency-safe state, and publishes typed lifecycle events on a
//! per-instance hot stream.
//!
//! - [`CircuitBreaker`]: short-circuits calls when the observed failure rate
//!   over a sliding bit window is too high
//! - [`RateLimiter`]: admits at most N operations per refresh period, with
//!   lock-free accounting and reservations for waiting callers
//! - [`Retry`]: re-executes a failing operation up to a bounded attempt count
//!
//! Guards can be combined freely; each wraps the next like any other
//! fallible function:
//!
//! ```
//! use rampart::{CircuitBreaker, Retry, RetryConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), rampart::ConfigError> {
//! let breaker = CircuitBreaker::of_defaults("backend");
//! let retry = Retry::new(
//!     "backend",
//!     RetryConfig::builder()
//!         .max_attempts(3)
//!         .wait_duration(Duration::from_millis(10))
//!         .build()?,
//! );
//!
//! let result = retry.call(|| breaker.call(|| Ok::<_, std::io::Error>("response")));
//! assert_eq!(result.unwrap(), "response");
//! # Ok(())
//! # }
//! ```
//!
//! Registries hand out process-lifetime instances by name:
//!
//! ```
//! use rampart::CircuitBreakerRegistry;
//!
//! let registry = CircuitBreakerRegistry::of_defaults();
//! let a = registry.circuit_breaker("payments");
//! let b = registry.circuit_breaker("payments");
//! a.transition_to_open();
//! assert_eq!(b.state(), a.state());
//! ```
//!
//! ## Feature flags
//! - `tracing`: guard decisions and transitions are logged with `tracing`
//! - `metrics`: outcome counters are recorded with the `metrics` facade

pub use rampart_core::{
    CircularEventConsumer, ConfigError, EventBus, EventListener, FnListener, GuardEvent,
    Subscription,
};

pub use rampart_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerError,
    CircuitBreakerEvent, CircuitBreakerMetrics, CircuitBreakerRegistry, CircuitBreakerState,
    RingBitBuffer, RingSnapshot,
};

pub use rampart_ratelimiter::{
    FailedAcquireReason, RateLimiter, RateLimiterConfig, RateLimiterConfigBuilder,
    RateLimiterError, RateLimiterEvent, RateLimiterMetrics, RateLimiterRegistry,
};

pub use rampart_retry::{
    Retry, RetryConfig, RetryConfigBuilder, RetryError, RetryEvent, RetryMetrics, RetryRegistry,
};

// Module aliases for the decorator helpers and anything not re-exported flat.
pub use rampart_circuitbreaker as circuitbreaker;
pub use rampart_ratelimiter as ratelimiter;
pub use rampart_retry as retry;
