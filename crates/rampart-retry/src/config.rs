use std::any::Any;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rampart_core::ConfigError;

/// Decides whether a failed attempt's error should be retried.
pub(crate) type ErrorPredicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Decides whether a returned value should be retried anyway.
pub(crate) type ResultPredicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// Immutable configuration for a retry instance.
#[derive(Clone)]
pub struct RetryConfig {
    pub(crate) max_attempts: u32,
    pub(crate) wait_duration: Duration,
    pub(crate) retry_on_error: ErrorPredicate,
    pub(crate) retry_on_result: Option<ResultPredicate>,
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("wait_duration", &self.wait_duration)
            .field("retry_on_result", &self.retry_on_result.is_some())
            .finish_non_exhaustive()
    }
}

impl RetryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait between attempts.
    pub fn wait_duration(&self) -> Duration {
        self.wait_duration
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration: Duration::from_millis(500),
            retry_on_error: Arc::new(|_| true),
            retry_on_result: None,
        }
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_attempts: u32,
    wait_duration: Duration,
    retry_on_error: ErrorPredicate,
    retry_on_result: Option<ResultPredicate>,
}

impl RetryConfigBuilder {
    /// Creates a builder with the defaults (3 attempts, 500 ms wait, every
    /// error retried).
    pub fn new() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            wait_duration: defaults.wait_duration,
            retry_on_error: defaults.retry_on_error,
            retry_on_result: defaults.retry_on_result,
        }
    }

    /// Sets the maximum number of attempts, including the first.
    ///
    /// Must be at least 1. Default: 3.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the wait between attempts. Default: 500 ms.
    pub fn wait_duration(mut self, wait: Duration) -> Self {
        self.wait_duration = wait;
        self
    }

    /// Sets the predicate deciding which errors are retried.
    ///
    /// Errors it rejects are surfaced to the caller immediately. Default:
    /// every error is retried.
    pub fn retry_on_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.retry_on_error = Arc::new(predicate);
        self
    }

    /// Retries calls whose *successful* result matches `predicate`.
    ///
    /// The predicate is consulted with the concrete value produced by the
    /// decorated function; values of any other type are never retried.
    pub fn retry_on_result<T, F>(mut self, predicate: F) -> Self
    where
        T: 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(move |value: &dyn Any| {
            value.downcast_ref::<T>().map(&predicate).unwrap_or(false)
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::new("max_attempts", "must be at least 1"));
        }
        Ok(RetryConfig {
            max_attempts: self.max_attempts,
            wait_duration: self.wait_duration,
            retry_on_error: self.retry_on_error,
            retry_on_result: self.retry_on_result,
        })
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
