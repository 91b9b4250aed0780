use thiserror::Error;

/// Errors returned by the retry decorators.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; `source` is the last attempt's error.
    #[error("retries exhausted after {attempts} attempts")]
    MaxRetriesExceeded {
        /// How many times the protected function ran.
        attempts: u32,
        /// The error of the final attempt.
        #[source]
        source: E,
    },

    /// The first matching error was not retryable and is surfaced unchanged.
    #[error(transparent)]
    Inner(E),
}

impl<E> RetryError<E> {
    /// Returns true if all attempts were used up.
    pub fn is_max_retries_exceeded(&self) -> bool {
        matches!(self, RetryError::MaxRetriesExceeded { .. })
    }

    /// Returns the underlying error from either variant.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxRetriesExceeded { source, .. } => source,
            RetryError::Inner(e) => e,
        }
    }
}
