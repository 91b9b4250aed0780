use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Retry, RetryConfig};

/// Name-keyed collection of retry instances sharing a default configuration.
///
/// Creation is idempotent: repeated lookups of the same name return the same
/// instance.
#[derive(Clone)]
pub struct RetryRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    default_config: RetryConfig,
    retries: RwLock<HashMap<String, Retry>>,
}

impl RetryRegistry {
    /// Creates a registry whose instances use the default configuration.
    pub fn of_defaults() -> Self {
        Self::with_config(RetryConfig::default())
    }

    /// Creates a registry with a shared default configuration.
    pub fn with_config(default_config: RetryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                default_config,
                retries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the retry instance registered under `name`, creating it with
    /// the registry default configuration if absent.
    pub fn retry(&self, name: &str) -> Retry {
        self.get_or_create(name, || self.inner.default_config.clone())
    }

    /// Returns the retry instance registered under `name`, creating it with
    /// `config` if absent. An existing instance wins; its configuration is
    /// unchanged.
    pub fn retry_with_config(&self, name: &str, config: RetryConfig) -> Retry {
        self.get_or_create(name, || config)
    }

    /// All retry instances created so far.
    pub fn all(&self) -> Vec<Retry> {
        self.inner.retries.read().values().cloned().collect()
    }

    fn get_or_create(&self, name: &str, config: impl FnOnce() -> RetryConfig) -> Retry {
        if let Some(retry) = self.inner.retries.read().get(name) {
            return retry.clone();
        }
        let mut retries = self.inner.retries.write();
        retries
            .entry(name.to_string())
            .or_insert_with(|| Retry::new(name, config()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn repeated_lookups_return_the_same_instance() {
        let registry = RetryRegistry::of_defaults();
        let first = registry.retry("fetch");
        let _ = first.call(|| Ok::<_, std::io::Error>(()));

        let second = registry.retry("fetch");
        assert_eq!(
            second
                .metrics()
                .number_of_successful_calls_without_retry_attempt,
            1
        );
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn explicit_config_applies_only_on_first_creation() {
        let registry = RetryRegistry::of_defaults();
        let custom = RetryConfig::builder()
            .max_attempts(7)
            .wait_duration(Duration::from_millis(1))
            .build()
            .unwrap();

        let first = registry.retry_with_config("fetch", custom);
        assert_eq!(first.config().max_attempts(), 7);

        let other = RetryConfig::builder().max_attempts(9).build().unwrap();
        let second = registry.retry_with_config("fetch", other);
        assert_eq!(second.config().max_attempts(), 7);
    }
}
