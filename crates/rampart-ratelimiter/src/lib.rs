//! Rate limiter guard admitting at most N operations per refresh period.
//!
//! Time is divided into cycles of `limit_refresh_period`; each cycle grants
//! `limit_for_period` permissions. The accounting lives in a single atomic
//! word updated by compare-and-swap, so acquisition is lock-free and concurrent
//! acquirers never block each other on the hot path. When a cycle is
//! exhausted, callers may reserve a permission in a future cycle and wait for
//! it, up to their timeout; the reservation is encoded as a negative
//! permission count.
//!
//! ## Example
//!
//! ```
//! use rampart_ratelimiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), rampart_core::ConfigError> {
//! let config = RateLimiterConfig::builder()
//!     .limit_for_period(2)
//!     .limit_refresh_period(Duration::from_secs(3600))
//!     .timeout_duration(Duration::ZERO)
//!     .build()?;
//! let limiter = RateLimiter::new("api", config);
//!
//! assert!(limiter.get_permission(Duration::ZERO));
//! assert!(limiter.get_permission(Duration::ZERO));
//! assert!(!limiter.get_permission(Duration::ZERO));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//! - `tracing`: rejected acquisitions are logged with the `tracing` crate
//! - `metrics`: acquisition outcomes are counted with the `metrics` facade

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rampart_core::{ConfigError, EventBus};

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::{FailedAcquireReason, RateLimiterEvent};
pub use registry::RateLimiterRegistry;

mod config;
mod error;
mod events;
mod limiter;
mod registry;

use limiter::AtomicCycleCore;

/// Point-in-time view of a limiter's accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterMetrics {
    /// Permissions available in the current cycle; negative values are
    /// reservations already handed to waiting callers.
    pub available_permissions: i64,
    /// Callers currently sleeping until their reservation becomes valid.
    pub number_of_waiting_threads: usize,
    /// The wait computed for the most recent successful acquire.
    pub nanos_to_wait: u64,
}

/// A rate limiter guarding one logical resource.
///
/// Cloning is cheap and every clone shares the same accounting.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    core: AtomicCycleCore,
    timeout_nanos: AtomicU64,
    waiting: AtomicUsize,
    events: EventBus<RateLimiterEvent>,
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Inner {
    fn emit_success(&self, nanos_waited: u64) {
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "ratelimiter_acquires_total",
            "ratelimiter" => self.name.clone(),
            "outcome" => "successful"
        )
        .increment(1);
        self.events.emit(&RateLimiterEvent::SuccessfulAcquire {
            name: self.name.clone(),
            created_at: SystemTime::now(),
            nanos_waited,
        });
    }

    fn emit_failed(&self, reason: FailedAcquireReason) {
        #[cfg(feature = "tracing")]
        tracing::debug!(ratelimiter = %self.name, ?reason, "permission not acquired");
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "ratelimiter_acquires_total",
            "ratelimiter" => self.name.clone(),
            "outcome" => "failed"
        )
        .increment(1);
        self.events.emit(&RateLimiterEvent::FailedAcquire {
            name: self.name.clone(),
            created_at: SystemTime::now(),
            reason,
        });
    }
}

// Emits the cancellation event if the waiting caller never completed, which
// happens when the async wait is dropped mid-sleep. The reservation itself is
// reclaimed by the cycle accounting at the next refresh.
struct WaitGuard<'a> {
    inner: &'a Inner,
    completed: bool,
}

impl<'a> WaitGuard<'a> {
    fn new(inner: &'a Inner) -> Self {
        inner.waiting.fetch_add(1, Ordering::Relaxed);
        Self {
            inner,
            completed: false,
        }
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.inner.waiting.fetch_sub(1, Ordering::Relaxed);
        if !self.completed {
            self.inner.emit_failed(FailedAcquireReason::Cancelled);
        }
    }
}

impl RateLimiter {
    /// Creates a limiter with the given name and configuration.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                core: AtomicCycleCore::new(
                    saturating_nanos(config.limit_refresh_period),
                    config.limit_for_period,
                ),
                timeout_nanos: AtomicU64::new(saturating_nanos(config.timeout_duration)),
                waiting: AtomicUsize::new(0),
                events: EventBus::new(),
            }),
        }
    }

    /// Creates a limiter with the default configuration.
    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::new(name, RateLimiterConfig::default())
    }

    /// Name of this instance, carried on every event.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The currently effective configuration.
    pub fn config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            limit_refresh_period: Duration::from_nanos(self.inner.core.period_nanos()),
            limit_for_period: self.inner.core.limit(),
            timeout_duration: Duration::from_nanos(self.inner.timeout_nanos.load(Ordering::Relaxed)),
        }
    }

    /// The event stream of this instance.
    pub fn events(&self) -> &EventBus<RateLimiterEvent> {
        &self.inner.events
    }

    /// Current accounting snapshot.
    pub fn metrics(&self) -> RateLimiterMetrics {
        RateLimiterMetrics {
            available_permissions: self.inner.core.available_permissions(),
            number_of_waiting_threads: self.inner.waiting.load(Ordering::Relaxed),
            nanos_to_wait: self.inner.core.last_nanos_to_wait(),
        }
    }

    /// Replaces the default acquisition timeout.
    pub fn change_timeout_duration(&self, timeout: Duration) {
        self.inner
            .timeout_nanos
            .store(saturating_nanos(timeout), Ordering::Relaxed);
    }

    /// Replaces the per-cycle permission limit. Takes full effect at the next
    /// cycle refresh.
    pub fn change_limit_for_period(&self, limit: u32) -> Result<(), ConfigError> {
        if limit == 0 {
            return Err(ConfigError::new(
                "limit_for_period",
                "must be greater than 0",
            ));
        }
        if limit > i32::MAX as u32 {
            return Err(ConfigError::new(
                "limit_for_period",
                format!("must be at most {}", i32::MAX),
            ));
        }
        self.inner.core.set_limit(limit);
        Ok(())
    }

    /// Attempts to acquire one permission within `timeout`, blocking the
    /// calling thread while waiting for a reservation.
    ///
    /// Emits [`RateLimiterEvent::SuccessfulAcquire`] or
    /// [`RateLimiterEvent::FailedAcquire`] on return.
    pub fn get_permission(&self, timeout: Duration) -> bool {
        match self.inner.core.try_reserve(saturating_nanos(timeout)) {
            Err(_) => {
                self.inner.emit_failed(FailedAcquireReason::Timeout);
                false
            }
            Ok(0) => {
                self.inner.emit_success(0);
                true
            }
            Ok(nanos) => {
                self.inner.waiting.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(Duration::from_nanos(nanos));
                self.inner.waiting.fetch_sub(1, Ordering::Relaxed);
                self.inner.emit_success(nanos);
                true
            }
        }
    }

    /// Async form of [`get_permission`](Self::get_permission); suspends
    /// instead of blocking while waiting.
    ///
    /// If the returned future is dropped during the wait, a
    /// [`RateLimiterEvent::FailedAcquire`] event with
    /// [`FailedAcquireReason::Cancelled`] is emitted and no successful event
    /// follows.
    pub async fn get_permission_async(&self, timeout: Duration) -> bool {
        match self.inner.core.try_reserve(saturating_nanos(timeout)) {
            Err(_) => {
                self.inner.emit_failed(FailedAcquireReason::Timeout);
                false
            }
            Ok(0) => {
                self.inner.emit_success(0);
                true
            }
            Ok(nanos) => {
                let mut guard = WaitGuard::new(&self.inner);
                tokio::time::sleep(Duration::from_nanos(nanos)).await;
                guard.completed = true;
                drop(guard);
                self.inner.emit_success(nanos);
                true
            }
        }
    }

    /// Acquires with the configured default timeout.
    pub fn acquire(&self) -> bool {
        self.get_permission(Duration::from_nanos(
            self.inner.timeout_nanos.load(Ordering::Relaxed),
        ))
    }

    /// Async form of [`acquire`](Self::acquire).
    pub async fn acquire_async(&self) -> bool {
        let timeout = Duration::from_nanos(self.inner.timeout_nanos.load(Ordering::Relaxed));
        self.get_permission_async(timeout).await
    }

    /// Runs `f` once a permission is acquired with the configured timeout.
    ///
    /// Returns [`RateLimiterError::RequestNotPermitted`] without running `f`
    /// when no permission became available.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, RateLimiterError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.acquire() {
            return Err(RateLimiterError::RequestNotPermitted {
                name: self.inner.name.clone(),
            });
        }
        f().map_err(RateLimiterError::Inner)
    }

    /// Async form of [`call`](Self::call).
    pub async fn call_async<T, E, F, Fut>(&self, f: F) -> Result<T, RateLimiterError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.acquire_async().await {
            return Err(RateLimiterError::RequestNotPermitted {
                name: self.inner.name.clone(),
            });
        }
        f().await.map_err(RateLimiterError::Inner)
    }
}

/// Wraps `f` so every invocation first acquires a permission from `limiter`.
pub fn decorate<T, E, F>(
    limiter: RateLimiter,
    mut f: F,
) -> impl FnMut() -> Result<T, RateLimiterError<E>>
where
    F: FnMut() -> Result<T, E>,
{
    move || limiter.call(&mut f)
}
