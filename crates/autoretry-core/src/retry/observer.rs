//! Retry observation and logging
//!
//! Every transition of a logical request is reported to a `RetryObserver`.
//! The controller defaults to [`NoOpObserver`], which keeps intermediate
//! failures silent; [`TracingObserver`] turns them into `tracing` events.

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::types::RequestKey;

/// Observer trait for retry lifecycle events
///
/// # Example
///
/// ```rust
/// use autoretry_core::retry::RetryObserver;
/// use autoretry_core::types::RequestKey;
/// use std::error::Error;
/// use std::time::Duration;
///
/// struct FailureCounter;
///
/// impl RetryObserver for FailureCounter {
///     fn on_attempt_start(&self, _key: &RequestKey, _attempt: u32, _max_attempts: u32) {}
///
///     fn on_attempt_failed(&self, key: &RequestKey, attempt: u32, error: &dyn Error, delay: Duration) {
///         eprintln!("{key}: attempt {attempt} failed ({error}), retrying in {delay:?}");
///     }
///
///     fn on_success(&self, _key: &RequestKey, _attempt: u32, _total_duration: Duration) {}
///
///     fn on_exhausted(&self, _key: &RequestKey, _attempts: u32, _final_error: &dyn Error) {}
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is issued
    ///
    /// `attempt` is 1-indexed; `max_attempts` is the retry budget plus one.
    fn on_attempt_start(&self, key: &RequestKey, attempt: u32, max_attempts: u32);

    /// Called when an attempt failed and a retry has been scheduled
    fn on_attempt_failed(&self, key: &RequestKey, attempt: u32, error: &dyn Error, delay: Duration);

    /// Called when an attempt succeeded
    fn on_success(&self, key: &RequestKey, attempt: u32, total_duration: Duration);

    /// Called when the final attempt failed or the error was not retryable
    fn on_exhausted(&self, key: &RequestKey, attempts: u32, final_error: &dyn Error);

    /// Called when the logical request is cancelled
    fn on_cancelled(&self, key: &RequestKey, attempts: u32, last_error: Option<&dyn Error>) {
        let _ = (key, attempts, last_error);
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _key: &RequestKey, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(
        &self,
        _key: &RequestKey,
        _attempt: u32,
        _error: &dyn Error,
        _delay: Duration,
    ) {
    }

    fn on_success(&self, _key: &RequestKey, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _key: &RequestKey, _attempts: u32, _final_error: &dyn Error) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO after a retry, DEBUG on the first attempt
/// - `on_exhausted`: ERROR
/// - `on_cancelled`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("http")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, key: &RequestKey, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            request = %key,
            attempt,
            max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, key: &RequestKey, attempt: u32, error: &dyn Error, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            request = %key,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, key: &RequestKey, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                request = %key,
                attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                request = %key,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, key: &RequestKey, attempts: u32, final_error: &dyn Error) {
        tracing::error!(
            operation = %self.operation,
            request = %key,
            attempts,
            error = %final_error,
            "giving up on request"
        );
    }

    fn on_cancelled(&self, key: &RequestKey, attempts: u32, last_error: Option<&dyn Error>) {
        match last_error {
            Some(err) => tracing::warn!(
                operation = %self.operation,
                request = %key,
                attempts,
                error = %err,
                "request cancelled"
            ),
            None => tracing::warn!(
                operation = %self.operation,
                request = %key,
                attempts,
                "request cancelled"
            ),
        }
    }
}

/// An observer that counts events
///
/// Useful for tests and for cheap metrics.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    cancellations: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts issued
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Number of failures that led to a retry
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Number of successful requests
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Number of requests that gave up
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Number of cancelled requests
    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _key: &RequestKey, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(
        &self,
        _key: &RequestKey,
        _attempt: u32,
        _error: &dyn Error,
        _delay: Duration,
    ) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _key: &RequestKey, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _key: &RequestKey, _attempts: u32, _final_error: &dyn Error) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _key: &RequestKey, _attempts: u32, _last_error: Option<&dyn Error>) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, key: &RequestKey, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(key, attempt, max_attempts)
    }

    fn on_attempt_failed(&self, key: &RequestKey, attempt: u32, error: &dyn Error, delay: Duration) {
        (**self).on_attempt_failed(key, attempt, error, delay)
    }

    fn on_success(&self, key: &RequestKey, attempt: u32, total_duration: Duration) {
        (**self).on_success(key, attempt, total_duration)
    }

    fn on_exhausted(&self, key: &RequestKey, attempts: u32, final_error: &dyn Error) {
        (**self).on_exhausted(key, attempts, final_error)
    }

    fn on_cancelled(&self, key: &RequestKey, attempts: u32, last_error: Option<&dyn Error>) {
        (**self).on_cancelled(key, attempts, last_error)
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, key: &RequestKey, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(key, attempt, max_attempts)
    }

    fn on_attempt_failed(&self, key: &RequestKey, attempt: u32, error: &dyn Error, delay: Duration) {
        (**self).on_attempt_failed(key, attempt, error, delay)
    }

    fn on_success(&self, key: &RequestKey, attempt: u32, total_duration: Duration) {
        (**self).on_success(key, attempt, total_duration)
    }

    fn on_exhausted(&self, key: &RequestKey, attempts: u32, final_error: &dyn Error) {
        (**self).on_exhausted(key, attempts, final_error)
    }

    fn on_cancelled(&self, key: &RequestKey, attempts: u32, last_error: Option<&dyn Error>) {
        (**self).on_cancelled(key, attempts, last_error)
    }
}
