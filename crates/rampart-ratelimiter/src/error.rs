use thiserror::Error;

/// Errors returned by the rate limiter decorators.
#[derive(Debug, Error)]
pub enum RateLimiterError<E> {
    /// No permission became available within the timeout; the protected
    /// function was not run.
    #[error("rate limiter '{name}' did not permit the request")]
    RequestNotPermitted {
        /// Name of the rejecting limiter instance.
        name: String,
    },

    /// The protected function ran and returned this error.
    #[error("inner call error: {0}")]
    Inner(E),
}

impl<E> RateLimiterError<E> {
    /// Returns true if the request was rejected without running.
    pub fn is_request_not_permitted(&self) -> bool {
        matches!(self, RateLimiterError::RequestNotPermitted { .. })
    }

    /// Returns the inner error if the protected function produced one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimiterError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_distinguish_variants() {
        let rejected: RateLimiterError<&str> = RateLimiterError::RequestNotPermitted {
            name: "api".to_string(),
        };
        assert!(rejected.is_request_not_permitted());
        assert_eq!(rejected.into_inner(), None);

        let inner = RateLimiterError::Inner("boom");
        assert!(!inner.is_request_not_permitted());
        assert_eq!(inner.into_inner(), Some("boom"));
    }
}
