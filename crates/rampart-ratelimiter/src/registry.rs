use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{RateLimiter, RateLimiterConfig};

/// Name-keyed collection of rate limiters sharing a default configuration.
///
/// Creation is idempotent: repeated lookups of the same name return the same
/// instance.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    default_config: RateLimiterConfig,
    limiters: RwLock<HashMap<String, RateLimiter>>,
}

impl RateLimiterRegistry {
    /// Creates a registry whose limiters use the default configuration.
    pub fn of_defaults() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    /// Creates a registry with a shared default configuration.
    pub fn with_config(default_config: RateLimiterConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                default_config,
                limiters: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the limiter registered under `name`, creating it with the
    /// registry default configuration if absent.
    pub fn rate_limiter(&self, name: &str) -> RateLimiter {
        self.get_or_create(name, || self.inner.default_config.clone())
    }

    /// Returns the limiter registered under `name`, creating it with `config`
    /// if absent. An existing instance wins; its configuration is unchanged.
    pub fn rate_limiter_with_config(&self, name: &str, config: RateLimiterConfig) -> RateLimiter {
        self.get_or_create(name, || config)
    }

    /// All limiters created so far.
    pub fn all(&self) -> Vec<RateLimiter> {
        self.inner.limiters.read().values().cloned().collect()
    }

    fn get_or_create(&self, name: &str, config: impl FnOnce() -> RateLimiterConfig) -> RateLimiter {
        if let Some(limiter) = self.inner.limiters.read().get(name) {
            return limiter.clone();
        }
        let mut limiters = self.inner.limiters.write();
        limiters
            .entry(name.to_string())
            .or_insert_with(|| RateLimiter::new(name, config()))
            .clone()
    }
}
