use thiserror::Error;

/// Errors returned by the circuit breaker decorators.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit does not permit calls; the protected function was not run.
    #[error("circuit breaker '{name}' does not permit calls")]
    CallNotPermitted {
        /// Name of the rejecting breaker instance.
        name: String,
    },

    /// The protected function ran and returned this error.
    #[error("inner call error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the call was rejected without running.
    pub fn is_call_not_permitted(&self) -> bool {
        matches!(self, CircuitBreakerError::CallNotPermitted { .. })
    }

    /// Returns the inner error if the protected function produced one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_distinguish_variants() {
        let rejected: CircuitBreakerError<&str> = CircuitBreakerError::CallNotPermitted {
            name: "backend".to_string(),
        };
        assert!(rejected.is_call_not_permitted());
        assert_eq!(rejected.into_inner(), None);

        let inner = CircuitBreakerError::Inner("boom");
        assert!(!inner.is_call_not_permitted());
        assert_eq!(inner.into_inner(), Some("boom"));
    }

    #[test]
    fn display_names_the_breaker() {
        let rejected: CircuitBreakerError<std::io::Error> = CircuitBreakerError::CallNotPermitted {
            name: "backend".to_string(),
        };
        assert_eq!(
            rejected.to_string(),
            "circuit breaker 'backend' does not permit calls"
        );
    }
}
