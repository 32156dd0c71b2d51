//! Error types for the retry controller
//!
//! `RetryError` is what a caller sees once a logical request has given up.
//! `AttemptInterrupted` describes an attempt that never produced its own
//! result because its task was aborted or panicked.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Terminal failure of a logical request
///
/// The error type is generic over `E`, the error produced by a single
/// attempt. Only the last attempt's error is carried; intermediate failures
/// are discarded.
#[derive(Debug)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total duration spent across all attempts
        total_duration: Duration,
    },

    /// The logical request was cancelled
    ///
    /// Either the caller invoked `cancel()` or the controller shut down.
    Cancelled {
        /// Number of attempts issued before cancellation
        attempts: u32,
        /// The last error that occurred, if any
        last_error: Option<E>,
    },

    /// A `RetryPredicate` rejected the error
    NonRetryable {
        /// Attempt number that produced the error
        attempts: u32,
        /// The rejected error
        source: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => {
                write!(
                    f,
                    "retry exhausted after {} attempts over {:.2}s: {}",
                    attempts,
                    total_duration.as_secs_f64(),
                    source
                )
            }
            RetryError::Cancelled {
                attempts,
                last_error,
            } => {
                if let Some(err) = last_error {
                    write!(f, "request cancelled after {} attempts: {}", attempts, err)
                } else {
                    write!(f, "request cancelled after {} attempts", attempts)
                }
            }
            RetryError::NonRetryable { attempts, source } => {
                write!(f, "non-retryable error on attempt {}: {}", attempts, source)
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled {
                last_error: Some(err),
                ..
            } => Some(err),
            RetryError::NonRetryable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Create a new exhausted error
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    /// Create a new cancelled error
    pub fn cancelled(attempts: u32, last_error: Option<E>) -> Self {
        RetryError::Cancelled {
            attempts,
            last_error,
        }
    }

    /// Create a new non-retryable error
    pub fn non_retryable(attempts: u32, source: E) -> Self {
        RetryError::NonRetryable { attempts, source }
    }

    /// Get the number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Cancelled { attempts, .. } => *attempts,
            RetryError::NonRetryable { attempts, .. } => *attempts,
        }
    }

    /// Check if this error indicates all retries were exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Check if this error is non-retryable
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable { .. })
    }

    /// Get the underlying error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
            RetryError::NonRetryable { source, .. } => Some(source),
        }
    }

    /// Get a reference to the underlying error
    pub fn source_ref(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
            RetryError::NonRetryable { source, .. } => Some(source),
        }
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => RetryError::Exhausted {
                attempts,
                source: f(source),
                total_duration,
            },
            RetryError::Cancelled {
                attempts,
                last_error,
            } => RetryError::Cancelled {
                attempts,
                last_error: last_error.map(f),
            },
            RetryError::NonRetryable { attempts, source } => RetryError::NonRetryable {
                attempts,
                source: f(source),
            },
        }
    }
}

/// An attempt whose task ended without producing a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttemptInterrupted {
    /// The attempt task was aborted, e.g. through `abort_attempt()`
    #[error("attempt was aborted")]
    Aborted,

    /// The attempt task panicked
    #[error("attempt panicked")]
    Panicked,
}

impl From<tokio::task::JoinError> for AttemptInterrupted {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            AttemptInterrupted::Panicked
        } else {
            AttemptInterrupted::Aborted
        }
    }
}

impl From<AttemptInterrupted> for std::io::Error {
    fn from(err: AttemptInterrupted) -> Self {
        let kind = match err {
            AttemptInterrupted::Aborted => std::io::ErrorKind::Interrupted,
            AttemptInterrupted::Panicked => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exhausted_error() {
        let err: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::new(io::ErrorKind::TimedOut, "timeout"),
            Duration::from_secs(5),
        );

        assert!(err.is_exhausted());
        assert!(!err.is_cancelled());
        assert!(!err.is_non_retryable());
        assert_eq!(err.attempts(), 3);
    }

    #[test]
    fn test_cancelled_error() {
        let err: RetryError<io::Error> = RetryError::cancelled(2, None);

        assert!(!err.is_exhausted());
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 2);
        assert!(err.source_ref().is_none());
    }

    #[test]
    fn test_non_retryable_error() {
        let err: RetryError<io::Error> =
            RetryError::non_retryable(2, io::Error::new(io::ErrorKind::NotFound, "not found"));

        assert!(err.is_non_retryable());
        assert_eq!(err.attempts(), 2);
    }

    #[test]
    fn test_into_source() {
        let err: RetryError<String> =
            RetryError::exhausted(3, "original error".to_string(), Duration::from_secs(1));

        assert_eq!(err.into_source(), Some("original error".to_string()));
    }

    #[test]
    fn test_map_err() {
        let err: RetryError<i32> = RetryError::cancelled(1, Some(42));

        let mapped = err.map_err(|n| format!("error code: {}", n));
        assert!(matches!(
            mapped,
            RetryError::Cancelled { last_error: Some(ref msg), .. } if msg == "error code: 42"
        ));
    }

    #[test]
    fn test_display() {
        let err: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::new(io::ErrorKind::TimedOut, "connection timeout"),
            Duration::from_secs(5),
        );

        let display = format!("{}", err);
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection timeout"));
    }

    #[test]
    fn test_error_source_chain() {
        let err: RetryError<io::Error> =
            RetryError::exhausted(1, io::Error::other("reset"), Duration::ZERO);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("reset"));
    }

    #[test]
    fn test_interrupted_into_io_error() {
        let err: io::Error = AttemptInterrupted::Aborted.into();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(err.to_string(), "attempt was aborted");
    }
}
