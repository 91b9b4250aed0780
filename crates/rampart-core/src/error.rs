use thiserror::Error;

/// Error returned synchronously by configuration builders for invalid values.
///
/// Carries the name of the offending parameter so callers can report exactly
/// which setting was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {parameter} {reason}")]
pub struct ConfigError {
    /// Name of the offending parameter.
    pub parameter: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new configuration error for `parameter`.
    pub fn new(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self {
            parameter,
            reason: reason.into(),
        }
    }
}
