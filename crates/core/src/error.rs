//! Failure taxonomy for protected operations.
//!
//! The engine distinguishes three failure kinds and never conflates
//! them, even though rejections and operation failures both count
//! toward the attempt budget:
//! - [`FailureKind::OperationFailed`]: the wrapped call itself failed;
//!   recorded against the breaker's window as health evidence.
//! - [`FailureKind::CircuitOpenRejected`]: the breaker declined to
//!   admit the call; never recorded into the window (a rejection is
//!   not new evidence of the operation's health).
//! - [`FailureKind::RetriesExhausted`]: surfaced to the caller once
//!   all attempts failed or were rejected, carrying the most recent
//!   underlying failure.

use thiserror::Error;

/// Simple configuration error for builder validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure kinds produced by a protected execution.
///
/// Generic over the wrapped operation's error type `E` so the original
/// error is preserved through the `source` chain.
// `Display` and `Error` are implemented by hand: deriving them with
// thiserror infers the cyclic bound `Box<FailureKind<E>>: Error` from
// the recursive source field, which can never be satisfied.
#[derive(Debug)]
pub enum FailureKind<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The wrapped operation failed; eligible for retry.
    OperationFailed { source: E },

    /// The circuit breaker declined to admit the call.
    CircuitOpenRejected,

    /// All attempts failed or were rejected; wraps the last failure.
    RetriesExhausted { attempts: u32, last: Box<FailureKind<E>> },
}

impl<E> std::fmt::Display for FailureKind<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::OperationFailed { .. } => write!(f, "Operation failed"),
            FailureKind::CircuitOpenRejected => {
                write!(f, "Circuit breaker is open, rejecting calls")
            }
            FailureKind::RetriesExhausted { attempts, .. } => {
                write!(f, "All {attempts} attempts exhausted")
            }
        }
    }
}

impl<E> std::error::Error for FailureKind<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FailureKind::OperationFailed { source } => Some(source),
            FailureKind::CircuitOpenRejected => None,
            FailureKind::RetriesExhausted { last, .. } => Some(last.as_ref()),
        }
    }
}

impl<E> FailureKind<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether this failure is (or wraps, for exhausted sequences) a
    /// circuit-open rejection rather than a real operation failure.
    pub fn is_rejection(&self) -> bool {
        match self {
            FailureKind::CircuitOpenRejected => true,
            FailureKind::OperationFailed { .. } => false,
            FailureKind::RetriesExhausted { last, .. } => last.is_rejection(),
        }
    }

    /// The innermost failure of an exhausted sequence, or `self` for
    /// the non-wrapped kinds.
    pub fn last_failure(&self) -> &FailureKind<E> {
        match self {
            FailureKind::RetriesExhausted { last, .. } => last.last_failure(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the failure taxonomy.

    use super::*;

    /// Validates `ConfigError::Invalid` behavior for the config error
    /// display scenario.
    ///
    /// Assertions:
    /// - Ensures `err.to_string().contains("bad value")` evaluates to true.
    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid { message: "bad value".to_string() };
        assert!(err.to_string().contains("bad value"));
    }

    /// Validates `FailureKind` display for each variant.
    ///
    /// Assertions:
    /// - Ensures the operation-failed message mentions the failure.
    /// - Ensures the rejection message mentions the open circuit.
    /// - Ensures the exhausted message carries the attempt count.
    #[test]
    fn test_failure_kind_display() {
        let err: FailureKind<std::io::Error> =
            FailureKind::OperationFailed { source: std::io::Error::other("boom") };
        assert!(err.to_string().contains("Operation failed"));

        let err: FailureKind<std::io::Error> = FailureKind::CircuitOpenRejected;
        assert!(err.to_string().contains("open"));

        let err: FailureKind<std::io::Error> = FailureKind::RetriesExhausted {
            attempts: 3,
            last: Box::new(FailureKind::CircuitOpenRejected),
        };
        assert!(err.to_string().contains("3 attempts"));
    }

    /// Validates `FailureKind::is_rejection` through a wrapped sequence.
    ///
    /// Assertions:
    /// - Ensures a bare rejection reports true.
    /// - Ensures an exhausted sequence wrapping a rejection reports true.
    /// - Ensures an exhausted sequence wrapping an operation failure
    ///   reports false.
    #[test]
    fn test_is_rejection() {
        let rejected: FailureKind<std::io::Error> = FailureKind::CircuitOpenRejected;
        assert!(rejected.is_rejection());

        let exhausted: FailureKind<std::io::Error> = FailureKind::RetriesExhausted {
            attempts: 2,
            last: Box::new(FailureKind::CircuitOpenRejected),
        };
        assert!(exhausted.is_rejection());

        let exhausted: FailureKind<std::io::Error> = FailureKind::RetriesExhausted {
            attempts: 2,
            last: Box::new(FailureKind::OperationFailed {
                source: std::io::Error::other("boom"),
            }),
        };
        assert!(!exhausted.is_rejection());
    }

    /// Validates `FailureKind::last_failure` unwraps nested exhaustion.
    ///
    /// Assertions:
    /// - Confirms the innermost failure is the operation failure.
    #[test]
    fn test_last_failure_unwraps() {
        let err: FailureKind<std::io::Error> = FailureKind::RetriesExhausted {
            attempts: 3,
            last: Box::new(FailureKind::OperationFailed {
                source: std::io::Error::other("inner"),
            }),
        };
        assert!(matches!(err.last_failure(), FailureKind::OperationFailed { .. }));
    }

    /// Validates the `source` chain reaches the wrapped error.
    ///
    /// Assertions:
    /// - Ensures the exhausted error's source is the last failure.
    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err: FailureKind<std::io::Error> = FailureKind::RetriesExhausted {
            attempts: 3,
            last: Box::new(FailureKind::OperationFailed {
                source: std::io::Error::other("root cause"),
            }),
        };

        let source = err.source().expect("exhausted error should have a source");
        assert!(source.to_string().contains("Operation failed"));
    }
}
