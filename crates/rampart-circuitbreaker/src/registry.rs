use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{CircuitBreaker, CircuitBreakerConfig};

/// Name-keyed collection of circuit breakers sharing a default configuration.
///
/// Creation is idempotent: repeated lookups of the same name return the same
/// instance. Instances are held for the process lifetime.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Creates a registry whose breakers use the default configuration.
    pub fn of_defaults() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Creates a registry with a shared default configuration.
    pub fn with_config(default_config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                default_config,
                breakers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the breaker registered under `name`, creating it with the
    /// registry default configuration if absent.
    pub fn circuit_breaker(&self, name: &str) -> CircuitBreaker {
        self.get_or_create(name, || self.inner.default_config.clone())
    }

    /// Returns the breaker registered under `name`, creating it with `config`
    /// if absent. An existing instance wins; its configuration is unchanged.
    pub fn circuit_breaker_with_config(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> CircuitBreaker {
        self.get_or_create(name, || config)
    }

    /// All breakers created so far.
    pub fn all(&self) -> Vec<CircuitBreaker> {
        self.inner.breakers.read().values().cloned().collect()
    }

    fn get_or_create(
        &self,
        name: &str,
        config: impl FnOnce() -> CircuitBreakerConfig,
    ) -> CircuitBreaker {
        if let Some(breaker) = self.inner.breakers.read().get(name) {
            return breaker.clone();
        }
        let mut breakers = self.inner.breakers.write();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::new(name, config()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CircuitBreakerState;

    #[test]
    fn repeated_lookups_return_the_same_instance() {
        let registry = CircuitBreakerRegistry::of_defaults();
        let first = registry.circuit_breaker("backend");
        first.transition_to_open();

        let second = registry.circuit_breaker("backend");
        assert_eq!(second.state(), CircuitBreakerState::Open);
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn explicit_config_applies_only_on_first_creation() {
        let registry = CircuitBreakerRegistry::of_defaults();
        let custom = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(7)
            .build()
            .unwrap();

        let first = registry.circuit_breaker_with_config("backend", custom);
        assert_eq!(first.config().ring_buffer_size_in_closed_state(), 7);

        let other = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(99)
            .build()
            .unwrap();
        let second = registry.circuit_breaker_with_config("backend", other);
        assert_eq!(second.config().ring_buffer_size_in_closed_state(), 7);
    }

    #[test]
    fn registry_default_config_is_used() {
        let default = CircuitBreakerConfig::builder()
            .ring_buffer_size_in_closed_state(12)
            .build()
            .unwrap();
        let registry = CircuitBreakerRegistry::with_config(default);

        let breaker = registry.circuit_breaker("db");
        assert_eq!(breaker.config().ring_buffer_size_in_closed_state(), 12);
    }

    #[test]
    fn all_lists_every_instance() {
        let registry = CircuitBreakerRegistry::of_defaults();
        registry.circuit_breaker("a");
        registry.circuit_breaker("b");
        registry.circuit_breaker("a");
        assert_eq!(registry.all().len(), 2);
    }
}
