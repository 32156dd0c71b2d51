//! Caller-facing handles for a logical request

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::error::RetryError;
use super::tracker::TaskTracker;
use crate::types::{LogicalRequest, RequestKey, RequestState, TaskId};

/// Handle to one physical attempt
#[derive(Debug, Clone)]
pub struct AttemptHandle {
    task: TaskId,
    abort: AbortHandle,
}

impl AttemptHandle {
    /// Identifier of the attempt
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Abort this attempt only
    ///
    /// The abort is reported as a failed attempt, so a request with budget
    /// left will retry.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Whether the attempt's task has completed
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// State shared between a request's driver and its handles
pub(crate) struct Shared {
    pub(crate) key: RequestKey,
    pub(crate) cancel: CancellationToken,
    pub(crate) runtime: Handle,
    current: Mutex<Option<AttemptHandle>>,
    attempts: AtomicU32,
    state: watch::Sender<RequestState>,
}

impl Shared {
    pub(crate) fn new(key: RequestKey, cancel: CancellationToken, runtime: Handle) -> Self {
        let (state, _) = watch::channel(RequestState::Pending);
        Self {
            key,
            cancel,
            runtime,
            current: Mutex::new(None),
            attempts: AtomicU32::new(0),
            state,
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<AttemptHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable control surface of a logical request
///
/// Obtained from [`RequestHandle::control`] or returned by
/// [`RequestHandle::on_complete`].
#[derive(Clone)]
pub struct RequestControl {
    pub(crate) shared: Arc<Shared>,
    pub(crate) tracker: Arc<TaskTracker>,
}

impl RequestControl {
    /// Stable identity of the logical request
    pub fn key(&self) -> &RequestKey {
        &self.shared.key
    }

    /// Current lifecycle state
    pub fn state(&self) -> RequestState {
        *self.shared.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<RequestState> {
        self.shared.state.subscribe()
    }

    /// Whether the request reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Number of attempts issued so far
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Handle of the in-flight attempt, if one is running
    pub fn current_attempt(&self) -> Option<AttemptHandle> {
        self.shared.current().clone()
    }

    /// Task id of the in-flight attempt, if one is running
    pub fn current_task(&self) -> Option<TaskId> {
        self.shared.current().as_ref().map(AttemptHandle::task)
    }

    /// Tracker entry of this request while it is in flight
    pub fn snapshot(&self) -> Option<LogicalRequest> {
        self.tracker.get(&self.shared.key)
    }

    /// Abort the in-flight attempt only
    ///
    /// Per-attempt cancellation: the request treats the abort as a failed
    /// attempt and retries if budget remains. Returns `false` when no
    /// attempt is running.
    pub fn abort_attempt(&self) -> bool {
        match self.shared.current().as_ref() {
            Some(attempt) => {
                attempt.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel the logical request
    ///
    /// Aborts the in-flight attempt and suppresses any scheduled retry. The
    /// outcome resolves to [`RetryError::Cancelled`].
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub(crate) fn launch<T, E, Fut>(&self, task: TaskId, attempt: Fut) -> JoinHandle<Result<T, E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let join = self.shared.runtime.spawn(attempt);
        *self.shared.current() = Some(AttemptHandle {
            task,
            abort: join.abort_handle(),
        });
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.transition(RequestState::Attempting);
        join
    }

    pub(crate) fn clear_current(&self) {
        self.shared.current().take();
    }

    pub(crate) fn transition(&self, next: RequestState) {
        self.shared.state.send_modify(|state| {
            debug_assert!(
                state.can_transition_to(next),
                "illegal request transition {} -> {}",
                state,
                next
            );
            *state = next;
        });
    }
}

impl std::fmt::Debug for RequestControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestControl")
            .field("key", &self.shared.key)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// Handle to a logical request, returned as soon as the first attempt is
/// issued
///
/// Awaiting the handle yields the request's outcome. Dropping it detaches:
/// the request keeps running and its outcome is discarded.
pub struct RequestHandle<T, E> {
    control: RequestControl,
    outcome: oneshot::Receiver<Result<T, RetryError<E>>>,
}

impl<T, E> Unpin for RequestHandle<T, E> {}

impl<T, E> RequestHandle<T, E> {
    pub(crate) fn new(
        control: RequestControl,
        outcome: oneshot::Receiver<Result<T, RetryError<E>>>,
    ) -> Self {
        Self { control, outcome }
    }

    /// Control surface for inspection and cancellation
    pub fn control(&self) -> &RequestControl {
        &self.control
    }

    /// Stable identity of the logical request
    pub fn key(&self) -> &RequestKey {
        self.control.key()
    }

    /// Handle of the in-flight attempt, if one is running
    pub fn current_attempt(&self) -> Option<AttemptHandle> {
        self.control.current_attempt()
    }

    /// Cancel the logical request; see [`RequestControl::cancel`]
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Deliver the outcome through callbacks instead of awaiting
    ///
    /// Exactly one of `on_success` or `on_failure` runs, once, on the
    /// request's runtime.
    pub fn on_complete<S, F>(self, on_success: S, on_failure: F) -> RequestControl
    where
        T: Send + 'static,
        E: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(RetryError<E>) + Send + 'static,
    {
        let control = self.control.clone();
        control.shared.runtime.spawn(async move {
            match self.await {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            }
        });
        control
    }
}

impl<T, E> Future for RequestHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.outcome).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Driver went away without reporting, e.g. runtime shutdown.
            Poll::Ready(Err(_)) => Poll::Ready(Err(RetryError::cancelled(
                this.control.attempts(),
                None,
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T, E> std::fmt::Debug for RequestHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("control", &self.control)
            .finish()
    }
}
