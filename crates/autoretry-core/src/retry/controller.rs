//! Retry controller
//!
//! Drives each logical request through
//! `Pending → Attempting → (Scheduled → Attempting)* → Succeeded | Failed | Cancelled`.
//! Every attempt runs as its own tokio task so it can be aborted on its own;
//! a driver task per logical request awaits attempts and timers in a loop.

use std::error::Error as StdError;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{AttemptInterrupted, RetryError};
use super::handle::{RequestControl, RequestHandle, Shared};
use super::observer::{NoOpObserver, RetryObserver, TracingObserver};
use super::strategies::{
    AlwaysRetry, BackoffCalculator, DelayInput, FixedInterval, RetryDelayCalculator,
    RetryPredicate,
};
use super::tracker::TaskTracker;
use crate::error::{Error, Result};
use crate::types::{
    BackoffStrategy, LogicalRequest, RequestKey, RequestState, RetryConfig, TaskId,
};

/// Per-request retry parameters
pub struct RetryOptions<E> {
    retries: u32,
    interval: Duration,
    key: Option<String>,
    predicate: Arc<dyn RetryPredicate<E>>,
}

impl<E> RetryOptions<E> {
    /// `retries` additional attempts after the first, no spacing
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            interval: Duration::ZERO,
            key: None,
            predicate: Arc::new(AlwaysRetry),
        }
    }

    /// Interval handed to the delay calculator
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Caller-supplied identity instead of the first attempt's task id
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Restrict which errors are retried
    pub fn with_predicate<P>(self, predicate: P) -> Self
    where
        P: RetryPredicate<E> + 'static,
    {
        self.with_shared_predicate(Arc::new(predicate))
    }

    /// Restrict which errors are retried, sharing an existing predicate
    pub fn with_shared_predicate(mut self, predicate: Arc<dyn RetryPredicate<E>>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Retry budget
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Requested interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Caller-supplied key, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            retries: self.retries,
            interval: self.interval,
            key: self.key.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("interval", &self.interval)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a `RetryController`
///
/// # Example
///
/// ```rust
/// use autoretry_core::retry::{DelayFn, RetryControllerBuilder, TracingObserver};
///
/// let controller = RetryControllerBuilder::new()
///     .with_delay_calculator(DelayFn::new(|_total, _remaining, modifier| u64::from(modifier)))
///     .with_delay_modifier(2)
///     .with_observer(TracingObserver::new("api"))
///     .build();
/// assert!(controller.tracker().is_empty());
/// ```
pub struct RetryControllerBuilder {
    calculator: Arc<dyn RetryDelayCalculator>,
    observer: Arc<dyn RetryObserver>,
    delay_modifier: u32,
    tracker: Option<Arc<TaskTracker>>,
}

impl Default for RetryControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryControllerBuilder {
    /// Fixed-interval delays, silent observer, zero modifier
    pub fn new() -> Self {
        Self {
            calculator: Arc::new(FixedInterval),
            observer: Arc::new(NoOpObserver),
            delay_modifier: 0,
            tracker: None,
        }
    }

    /// Set the delay calculator used by every retry sequence
    pub fn with_delay_calculator<C>(mut self, calculator: C) -> Self
    where
        C: RetryDelayCalculator + 'static,
    {
        self.calculator = Arc::new(calculator);
        self
    }

    /// Set the observer
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: RetryObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Set the modifier passed to every delay calculation
    pub fn with_delay_modifier(mut self, delay_modifier: u32) -> Self {
        self.delay_modifier = delay_modifier;
        self
    }

    /// Use an existing tracker instead of creating one
    pub fn with_tracker(mut self, tracker: Arc<TaskTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Build the controller
    pub fn build(self) -> RetryController {
        RetryController {
            inner: Arc::new(ControllerInner {
                tracker: self.tracker.unwrap_or_default(),
                calculator: self.calculator,
                observer: self.observer,
                delay_modifier: self.delay_modifier,
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

struct ControllerInner {
    tracker: Arc<TaskTracker>,
    calculator: Arc<dyn RetryDelayCalculator>,
    observer: Arc<dyn RetryObserver>,
    delay_modifier: u32,
    shutdown: CancellationToken,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Orchestrates retries for any number of concurrent logical requests
///
/// Cheap to clone; clones share the tracker and configuration. When the
/// last clone is dropped every in-flight request is cancelled.
#[derive(Clone)]
pub struct RetryController {
    inner: Arc<ControllerInner>,
}

impl Default for RetryController {
    fn default() -> Self {
        RetryControllerBuilder::new().build()
    }
}

impl RetryController {
    /// Controller with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a controller
    pub fn builder() -> RetryControllerBuilder {
        RetryControllerBuilder::new()
    }

    /// Controller configured from the `retry` section of the runtime config
    ///
    /// A fixed strategy without jitter uses [`FixedInterval`], so each
    /// request's interval is honoured exactly and `max-delay-secs` only
    /// bounds the growing strategies.
    pub fn from_config(config: &RetryConfig) -> Self {
        let builder = RetryControllerBuilder::new().with_delay_modifier(config.delay_modifier);
        let builder = match config.backoff.strategy {
            BackoffStrategy::Fixed if !config.backoff.jitter => builder,
            _ => builder.with_delay_calculator(BackoffCalculator::new(config.backoff.clone())),
        };

        if config.log_attempts {
            builder.with_observer(TracingObserver::default()).build()
        } else {
            builder.build()
        }
    }

    /// The tracker holding every in-flight logical request
    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.inner.tracker
    }

    /// Number of in-flight logical requests
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Cancel every in-flight request and refuse new ones
    pub fn shutdown(&self) {
        tracing::debug!(in_flight = self.in_flight(), "retry controller shutting down");
        self.inner.shutdown.cancel();
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Run `attempt` with retries
    ///
    /// The first attempt is issued before this returns. Each later attempt
    /// is issued only after the previous one completed and the computed
    /// delay elapsed.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRuntime`] outside a tokio runtime
    /// - [`Error::ControllerShutdown`] after [`shutdown`](Self::shutdown)
    /// - [`Error::DuplicateRequestKey`] if `options` carries a key already
    ///   in flight
    ///
    /// No attempt is issued in any of these cases.
    pub fn execute<T, E, F, Fut>(
        &self,
        options: RetryOptions<E>,
        mut attempt: F,
    ) -> Result<RequestHandle<T, E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: StdError + From<AttemptInterrupted> + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        if self.is_shut_down() {
            return Err(Error::ControllerShutdown);
        }

        let tracker = self.inner.tracker.clone();
        let task = tracker.issue_task_id();
        let key = match &options.key {
            Some(key) => RequestKey::Custom(key.clone()),
            None => RequestKey::Task(task),
        };
        let request = LogicalRequest::new(key.clone(), task, options.retries, options.interval);
        tracker.register_new(task, request.clone())?;

        let control = RequestControl {
            shared: Arc::new(Shared::new(
                key.clone(),
                self.inner.shutdown.child_token(),
                runtime.clone(),
            )),
            tracker,
        };

        tracing::debug!(
            request = %key,
            task = %task,
            retries = options.retries,
            interval_ms = millis(options.interval),
            "issuing first attempt"
        );
        self.inner
            .observer
            .on_attempt_start(&key, 1, request.max_attempts());
        let join = control.launch(task, start_attempt(&mut attempt));

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let driver = Driver {
            control: control.clone(),
            calculator: self.inner.calculator.clone(),
            observer: self.inner.observer.clone(),
            delay_modifier: self.inner.delay_modifier,
            predicate: options.predicate,
            attempt,
            request,
            started: Instant::now(),
            outcome: outcome_tx,
        };
        runtime.spawn(driver.run(task, join));

        Ok(RequestHandle::new(control, outcome_rx))
    }
}

impl std::fmt::Debug for RetryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryController")
            .field("in_flight", &self.in_flight())
            .field("delay_modifier", &self.inner.delay_modifier)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Call the attempt factory, turning a panic into an interrupted attempt
fn start_attempt<T, E, F, Fut>(
    attempt: &mut F,
) -> impl Future<Output = std::result::Result<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<AttemptInterrupted>,
{
    let started = panic::catch_unwind(AssertUnwindSafe(attempt)).ok();
    async move {
        match started {
            Some(fut) => fut.await,
            None => Err(E::from(AttemptInterrupted::Panicked)),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Wait out a retry delay without blocking
///
/// A zero delay still yields once so the retry runs on a later scheduler
/// tick rather than inline.
async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

/// Per-request state machine, run as its own task
struct Driver<T, E, F> {
    control: RequestControl,
    calculator: Arc<dyn RetryDelayCalculator>,
    observer: Arc<dyn RetryObserver>,
    delay_modifier: u32,
    predicate: Arc<dyn RetryPredicate<E>>,
    attempt: F,
    request: LogicalRequest,
    started: Instant,
    outcome: oneshot::Sender<std::result::Result<T, RetryError<E>>>,
}

impl<T, E, F, Fut> Driver<T, E, F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: StdError + From<AttemptInterrupted> + Send + Sync + 'static,
{
    async fn run(mut self, mut task: TaskId, mut join: JoinHandle<std::result::Result<T, E>>) {
        let cancel = self.control.shared.cancel.clone();

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join.abort();
                    self.finish_cancelled(task, None);
                    return;
                }
                joined = &mut join => joined,
            };

            let error = match joined {
                Ok(Ok(value)) => {
                    self.finish_success(task, value);
                    return;
                }
                Ok(Err(err)) => err,
                Err(join_err) => E::from(AttemptInterrupted::from(join_err)),
            };

            let attempt = self.request.attempt;
            if !self.predicate.should_retry(&error) {
                self.finish_failure(task, RetryError::non_retryable(attempt, error));
                return;
            }
            if self.request.retries_remaining == 0 {
                let elapsed = self.started.elapsed();
                self.finish_failure(task, RetryError::exhausted(attempt, error, elapsed));
                return;
            }

            let delay = self.calculator.delay(&DelayInput {
                total_retries_allowed: self.request.total_retries_allowed,
                retries_remaining: self.request.retries_remaining,
                delay_modifier: self.delay_modifier,
                interval: self.request.interval,
            });
            self.observer
                .on_attempt_failed(&self.request.key, attempt, &error, delay);
            self.schedule(task, delay);

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = pause(delay) => false,
            };
            if cancelled {
                self.finish_cancelled(task, Some(error));
                return;
            }

            let next = self.control.tracker.issue_task_id();
            self.request.attempt += 1;
            self.request.retries_remaining -= 1;
            self.request.state = RequestState::Attempting;
            self.request.next_delay = None;
            self.control.tracker.register(next, self.request.clone());

            tracing::debug!(
                request = %self.request.key,
                task = %next,
                attempt = self.request.attempt,
                retries_remaining = self.request.retries_remaining,
                "issuing retry"
            );
            self.observer.on_attempt_start(
                &self.request.key,
                self.request.attempt,
                self.request.max_attempts(),
            );
            join = self
                .control
                .launch(next, start_attempt(&mut self.attempt));
            task = next;
        }
    }

    fn schedule(&mut self, task: TaskId, delay: Duration) {
        tracing::debug!(
            request = %self.request.key,
            task = %task,
            attempt = self.request.attempt,
            delay_ms = millis(delay),
            "attempt failed, retry scheduled"
        );
        self.request.state = RequestState::Scheduled;
        self.request.next_delay = Some(delay);
        self.control.tracker.update(task, |entry| {
            entry.state = RequestState::Scheduled;
            entry.next_delay = Some(delay);
        });
        self.control.clear_current();
        self.control.transition(RequestState::Scheduled);
    }

    fn finish(&self, task: TaskId, state: RequestState) {
        self.control.tracker.unregister(task);
        self.control.clear_current();
        self.control.transition(state);
        tracing::debug!(
            request = %self.request.key,
            task = %task,
            attempts = self.request.attempt,
            state = %state,
            "request finished"
        );
    }

    fn finish_success(self, task: TaskId, value: T) {
        self.finish(task, RequestState::Succeeded);
        self.observer
            .on_success(&self.request.key, self.request.attempt, self.started.elapsed());
        let _ = self.outcome.send(Ok(value));
    }

    fn finish_failure(self, task: TaskId, error: RetryError<E>) {
        self.finish(task, RequestState::Failed);
        if let Some(source) = error.source_ref() {
            self.observer
                .on_exhausted(&self.request.key, error.attempts(), source);
        }
        let _ = self.outcome.send(Err(error));
    }

    fn finish_cancelled(self, task: TaskId, last_error: Option<E>) {
        self.finish(task, RequestState::Cancelled);
        let attempts = self.control.attempts();
        self.observer.on_cancelled(
            &self.request.key,
            attempts,
            last_error.as_ref().map(|err| err as &dyn StdError),
        );
        let _ = self
            .outcome
            .send(Err(RetryError::cancelled(attempts, last_error)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates_instead_of_truncating() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
