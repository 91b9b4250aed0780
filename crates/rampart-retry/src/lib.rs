//! Retry guard re-executing a failing operation up to a bounded attempt count.
//!
//! A single [`Retry`] instance may be shared by any number of concurrent
//! calls: the attempt counter lives on the caller's stack, while the instance
//! only aggregates outcome counters and publishes events.
//!
//! ## Example
//!
//! ```
//! use rampart_retry::{Retry, RetryConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), rampart_core::ConfigError> {
//! let config = RetryConfig::builder()
//!     .max_attempts(3)
//!     .wait_duration(Duration::from_millis(10))
//!     .build()?;
//! let retry = Retry::new("fetch", config);
//!
//! let mut attempts = 0;
//! let value = retry.call(|| {
//!     attempts += 1;
//!     if attempts < 2 {
//!         Err(std::io::Error::new(std::io::ErrorKind::Other, "flaky"))
//!     } else {
//!         Ok("done")
//!     }
//! });
//! assert_eq!(value.unwrap(), "done");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//! - `tracing`: retries and exhaustion are logged with the `tracing` crate
//! - `metrics`: call outcomes are counted with the `metrics` facade

use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rampart_core::EventBus;

pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use registry::RetryRegistry;

mod config;
mod error;
mod events;
mod registry;

/// Aggregate outcome counters of a retry instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryMetrics {
    /// Calls that succeeded on the first attempt.
    pub number_of_successful_calls_without_retry_attempt: u64,
    /// Calls that succeeded after at least one retry.
    pub number_of_successful_calls_with_retry_attempt: u64,
    /// Calls that failed without any retry (not retryable, or one attempt).
    pub number_of_failed_calls_without_retry_attempt: u64,
    /// Calls that failed after at least one retry.
    pub number_of_failed_calls_with_retry_attempt: u64,
}

/// A retry controller guarding one kind of operation.
///
/// Cloning is cheap and every clone shares the same counters and event bus.
#[derive(Clone)]
pub struct Retry {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: RetryConfig,
    events: EventBus<RetryEvent>,
    successful_without_retry: AtomicU64,
    successful_with_retry: AtomicU64,
    failed_without_retry: AtomicU64,
    failed_with_retry: AtomicU64,
}

// Per-call state, owned by a single caller for the duration of one decorated
// call; never shared across calls.
struct CallContext {
    attempts: u32,
}

enum OkOutcome {
    Done,
    RetryAfter(Duration),
}

enum ErrOutcome {
    Propagate,
    Exhausted,
    RetryAfter(Duration),
}

impl Inner {
    fn on_ok<T: 'static>(&self, ctx: &mut CallContext, value: &T) -> OkOutcome {
        ctx.attempts += 1;
        if let Some(predicate) = &self.config.retry_on_result {
            if predicate(value) && ctx.attempts < self.config.max_attempts {
                let wait = self.config.wait_duration;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    retry = %self.name,
                    attempt = ctx.attempts,
                    "result matched retry predicate, retrying"
                );
                self.events.emit(&RetryEvent::Retry {
                    name: self.name.clone(),
                    created_at: SystemTime::now(),
                    attempt: ctx.attempts,
                    error: None,
                    wait,
                });
                return OkOutcome::RetryAfter(wait);
            }
            // Out of attempts: the last value is handed back as-is.
        }
        if ctx.attempts > 1 {
            self.successful_with_retry.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::counter!(
                "retry_calls_total",
                "retry" => self.name.clone(),
                "result" => "success"
            )
            .increment(1);
            self.events.emit(&RetryEvent::Success {
                name: self.name.clone(),
                created_at: SystemTime::now(),
                attempts: ctx.attempts,
            });
        } else {
            self.successful_without_retry.fetch_add(1, Ordering::Relaxed);
        }
        OkOutcome::Done
    }

    fn on_err<E>(&self, ctx: &mut CallContext, error: &E) -> ErrOutcome
    where
        E: Error + 'static,
    {
        ctx.attempts += 1;
        if !(self.config.retry_on_error)(error) {
            self.failed_without_retry.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(retry = %self.name, "error not retryable, failing immediately");
            self.events.emit(&RetryEvent::IgnoredError {
                name: self.name.clone(),
                created_at: SystemTime::now(),
                error: error.to_string(),
            });
            return ErrOutcome::Propagate;
        }
        if ctx.attempts >= self.config.max_attempts {
            if ctx.attempts > 1 {
                self.failed_with_retry.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed_without_retry.fetch_add(1, Ordering::Relaxed);
            }
            #[cfg(feature = "tracing")]
            tracing::warn!(
                retry = %self.name,
                attempts = ctx.attempts,
                "retry attempts exhausted"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!(
                "retry_calls_total",
                "retry" => self.name.clone(),
                "result" => "exhausted"
            )
            .increment(1);
            self.events.emit(&RetryEvent::Error {
                name: self.name.clone(),
                created_at: SystemTime::now(),
                attempts: ctx.attempts,
                error: error.to_string(),
            });
            return ErrOutcome::Exhausted;
        }
        let wait = self.config.wait_duration;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry = %self.name,
            attempt = ctx.attempts,
            wait_ms = wait.as_millis() as u64,
            "retrying after wait"
        );
        self.events.emit(&RetryEvent::Retry {
            name: self.name.clone(),
            created_at: SystemTime::now(),
            attempt: ctx.attempts,
            error: Some(error.to_string()),
            wait,
        });
        ErrOutcome::RetryAfter(wait)
    }
}

impl Retry {
    /// Creates a retry instance with the given name and configuration.
    pub fn new(name: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                events: EventBus::new(),
                successful_without_retry: AtomicU64::new(0),
                successful_with_retry: AtomicU64::new(0),
                failed_without_retry: AtomicU64::new(0),
                failed_with_retry: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a retry instance with the default configuration.
    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::new(name, RetryConfig::default())
    }

    /// Name of this instance, carried on every event.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    /// The event stream of this instance.
    pub fn events(&self) -> &EventBus<RetryEvent> {
        &self.inner.events
    }

    /// Aggregate outcome counters.
    pub fn metrics(&self) -> RetryMetrics {
        RetryMetrics {
            number_of_successful_calls_without_retry_attempt: self
                .inner
                .successful_without_retry
                .load(Ordering::Relaxed),
            number_of_successful_calls_with_retry_attempt: self
                .inner
                .successful_with_retry
                .load(Ordering::Relaxed),
            number_of_failed_calls_without_retry_attempt: self
                .inner
                .failed_without_retry
                .load(Ordering::Relaxed),
            number_of_failed_calls_with_retry_attempt: self
                .inner
                .failed_with_retry
                .load(Ordering::Relaxed),
        }
    }

    /// Runs `f`, retrying failed attempts up to the configured bound and
    /// blocking the calling thread between attempts.
    ///
    /// Errors rejected by the retry predicate are surfaced unchanged as
    /// [`RetryError::Inner`]; exhaustion surfaces the last error as the
    /// source of [`RetryError::MaxRetriesExceeded`].
    pub fn call<T, E, F>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        T: 'static,
        E: Error + 'static,
        F: FnMut() -> Result<T, E>,
    {
        let mut ctx = CallContext { attempts: 0 };
        loop {
            match f() {
                Ok(value) => match self.inner.on_ok(&mut ctx, &value) {
                    OkOutcome::Done => return Ok(value),
                    OkOutcome::RetryAfter(wait) => std::thread::sleep(wait),
                },
                Err(error) => match self.inner.on_err(&mut ctx, &error) {
                    ErrOutcome::Propagate => return Err(RetryError::Inner(error)),
                    ErrOutcome::Exhausted => {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: ctx.attempts,
                            source: error,
                        })
                    }
                    ErrOutcome::RetryAfter(wait) => std::thread::sleep(wait),
                },
            }
        }
    }

    /// Async form of [`call`](Self::call); suspends between attempts.
    ///
    /// Cancelling the returned future between attempts simply stops the loop;
    /// no further events are emitted.
    pub async fn call_async<T, E, F, Fut>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        T: 'static,
        E: Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut ctx = CallContext { attempts: 0 };
        loop {
            match f().await {
                Ok(value) => match self.inner.on_ok(&mut ctx, &value) {
                    OkOutcome::Done => return Ok(value),
                    OkOutcome::RetryAfter(wait) => tokio::time::sleep(wait).await,
                },
                Err(error) => match self.inner.on_err(&mut ctx, &error) {
                    ErrOutcome::Propagate => return Err(RetryError::Inner(error)),
                    ErrOutcome::Exhausted => {
                        return Err(RetryError::MaxRetriesExceeded {
                            attempts: ctx.attempts,
                            source: error,
                        })
                    }
                    ErrOutcome::RetryAfter(wait) => tokio::time::sleep(wait).await,
                },
            }
        }
    }
}

/// Wraps `f` so every invocation runs through `retry`.
pub fn decorate<T, E, F>(retry: Retry, mut f: F) -> impl FnMut() -> Result<T, RetryError<E>>
where
    T: 'static,
    E: Error + 'static,
    F: FnMut() -> Result<T, E>,
{
    move || retry.call(&mut f)
}
