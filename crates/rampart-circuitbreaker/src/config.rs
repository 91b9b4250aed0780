use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rampart_core::ConfigError;

/// Decides whether a reported error counts as a failure.
pub(crate) type FailurePredicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Immutable configuration for a circuit breaker.
///
/// Constructed once via [`CircuitBreakerConfig::builder`] and shared between
/// instances; [`Default`] yields the stock settings (50% threshold, 60 s open
/// wait, windows of 100/10 calls, every error recorded).
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f32,
    pub(crate) wait_duration_in_open_state: Duration,
    pub(crate) ring_buffer_size_in_closed_state: usize,
    pub(crate) ring_buffer_size_in_half_open_state: usize,
    pub(crate) record_failure: FailurePredicate,
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field(
                "wait_duration_in_open_state",
                &self.wait_duration_in_open_state,
            )
            .field(
                "ring_buffer_size_in_closed_state",
                &self.ring_buffer_size_in_closed_state,
            )
            .field(
                "ring_buffer_size_in_half_open_state",
                &self.ring_buffer_size_in_half_open_state,
            )
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Failure percentage at or above which the circuit opens.
    pub fn failure_rate_threshold(&self) -> f32 {
        self.failure_rate_threshold
    }

    /// How long the circuit stays open before probing.
    pub fn wait_duration_in_open_state(&self) -> Duration {
        self.wait_duration_in_open_state
    }

    /// Sliding-window size while closed.
    pub fn ring_buffer_size_in_closed_state(&self) -> usize {
        self.ring_buffer_size_in_closed_state
    }

    /// Sliding-window size while half-open.
    pub fn ring_buffer_size_in_half_open_state(&self) -> usize {
        self.ring_buffer_size_in_half_open_state
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            wait_duration_in_open_state: Duration::from_secs(60),
            ring_buffer_size_in_closed_state: 100,
            ring_buffer_size_in_half_open_state: 10,
            record_failure: Arc::new(|_| true),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f32,
    wait_duration_in_open_state: Duration,
    ring_buffer_size_in_closed_state: usize,
    ring_buffer_size_in_half_open_state: usize,
    record_failure: FailurePredicate,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a builder with the default settings.
    pub fn new() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_rate_threshold: defaults.failure_rate_threshold,
            wait_duration_in_open_state: defaults.wait_duration_in_open_state,
            ring_buffer_size_in_closed_state: defaults.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: defaults.ring_buffer_size_in_half_open_state,
            record_failure: defaults.record_failure,
        }
    }

    /// Sets the failure percentage at or above which the circuit opens.
    ///
    /// Must lie in `(0, 100]`. Default: 50.
    pub fn failure_rate_threshold(mut self, percent: f32) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    /// Sets how long the circuit stays open before a probe is allowed.
    ///
    /// Default: 60 seconds.
    pub fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open_state = duration;
        self
    }

    /// Sets the sliding-window size used while closed.
    ///
    /// The failure rate is only evaluated once this many outcomes have been
    /// recorded, which avoids tripping on small samples. Default: 100.
    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_closed_state = size;
        self
    }

    /// Sets the sliding-window size used while half-open.
    ///
    /// Default: 10.
    pub fn ring_buffer_size_in_half_open_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_half_open_state = size;
        self
    }

    /// Sets the predicate deciding which errors are recorded as failures.
    ///
    /// Errors it rejects are ignored for failure accounting but still reach
    /// the caller. Default: every error is recorded.
    pub fn record_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.record_failure = Arc::new(predicate);
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(ConfigError::new(
                "failure_rate_threshold",
                format!(
                    "must be in (0, 100], got {}",
                    self.failure_rate_threshold
                ),
            ));
        }
        if self.ring_buffer_size_in_closed_state == 0 {
            return Err(ConfigError::new(
                "ring_buffer_size_in_closed_state",
                "must be greater than 0",
            ));
        }
        if self.ring_buffer_size_in_half_open_state == 0 {
            return Err(ConfigError::new(
                "ring_buffer_size_in_half_open_state",
                "must be greater than 0",
            ));
        }

        Ok(CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: self.ring_buffer_size_in_half_open_state,
            record_failure: self.record_failure,
        })
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = CircuitBreakerConfig::builder().build().unwrap();
        assert_eq!(config.failure_rate_threshold(), 50.0);
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_secs(60));
        assert_eq!(config.ring_buffer_size_in_closed_state(), 100);
        assert_eq!(config.ring_buffer_size_in_half_open_state(), 10);
    }

    #[test]
    fn rejects_threshold_outside_range() {
        for bad in [0.0, -1.0, 100.5] {
            let err = CircuitBreakerConfig::builder()
                .failure_rate_threshold(bad)
                .build()
                .unwrap_err();
            assert_eq!(err.parameter, "failure_rate_threshold");
        }
        assert!(CircuitBreakerConfig::builder()
            .failure_rate_threshold(100.0)
            .build()
            .is_ok());
    }

    #[test]
    fn rejects_zero_ring_sizes() {
        let err = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(0)
            .build()
            .unwrap_err();
        assert_eq!(err.parameter, "ring_buffer_size_in_closed_state");

        let err = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_half_open_state(0)
            .build()
            .unwrap_err();
        assert_eq!(err.parameter, "ring_buffer_size_in_half_open_state");
    }

    #[test]
    fn custom_failure_predicate_is_kept() {
        let config = CircuitBreakerConfig::builder()
            .record_failure(|error| error.to_string().contains("io"))
            .build()
            .unwrap();

        let io = std::io::Error::new(std::io::ErrorKind::Other, "io failure");
        let parse = "x".parse::<u32>().unwrap_err();
        assert!((config.record_failure)(&io));
        assert!(!(config.record_failure)(&parse));
    }
}
