use std::time::Duration;

use rampart_core::ConfigError;

/// Immutable configuration for a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub(crate) limit_refresh_period: Duration,
    pub(crate) limit_for_period: u32,
    pub(crate) timeout_duration: Duration,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Length of one permission cycle.
    pub fn limit_refresh_period(&self) -> Duration {
        self.limit_refresh_period
    }

    /// Permissions granted per cycle.
    pub fn limit_for_period(&self) -> u32 {
        self.limit_for_period
    }

    /// Default wait budget used by [`RateLimiter::acquire`](crate::RateLimiter::acquire).
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_refresh_period: Duration::from_nanos(500),
            limit_for_period: 50,
            timeout_duration: Duration::from_secs(5),
        }
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    limit_refresh_period: Duration,
    limit_for_period: u32,
    timeout_duration: Duration,
}

impl RateLimiterConfigBuilder {
    /// Creates a builder with the defaults (500 ns period, 50 permissions,
    /// 5 s timeout).
    pub fn new() -> Self {
        let defaults = RateLimiterConfig::default();
        Self {
            limit_refresh_period: defaults.limit_refresh_period,
            limit_for_period: defaults.limit_for_period,
            timeout_duration: defaults.timeout_duration,
        }
    }

    /// Sets the cycle length. Must be at least one nanosecond.
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Sets the number of permissions granted per cycle. Must be positive.
    pub fn limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Sets the default wait budget for acquisition.
    pub fn timeout_duration(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RateLimiterConfig, ConfigError> {
        if self.limit_refresh_period < Duration::from_nanos(1) {
            return Err(ConfigError::new(
                "limit_refresh_period",
                "must be at least 1ns",
            ));
        }
        if self.limit_for_period == 0 {
            return Err(ConfigError::new(
                "limit_for_period",
                "must be greater than 0",
            ));
        }
        if self.limit_for_period > i32::MAX as u32 {
            return Err(ConfigError::new(
                "limit_for_period",
                format!("must be at most {}", i32::MAX),
            ));
        }
        Ok(RateLimiterConfig {
            limit_refresh_period: self.limit_refresh_period,
            limit_for_period: self.limit_for_period,
            timeout_duration: self.timeout_duration,
        })
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
