//! Identity and state types for logical requests and their attempts

use std::fmt;
use std::time::{Duration, Instant};

/// Identifier of one physical attempt
///
/// Issued by the [`TaskTracker`](crate::retry::TaskTracker); strictly
/// increasing for the lifetime of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Stable identity of a logical request across all of its attempts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Derived from the first attempt's task id
    Task(TaskId),

    /// Supplied by the caller
    Custom(String),
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Task(task) => write!(f, "{}", task),
            RequestKey::Custom(key) => f.write_str(key),
        }
    }
}

impl From<&str> for RequestKey {
    fn from(key: &str) -> Self {
        RequestKey::Custom(key.to_string())
    }
}

impl From<String> for RequestKey {
    fn from(key: String) -> Self {
        RequestKey::Custom(key)
    }
}

/// Lifecycle state of a logical request
///
/// ```text
/// Pending ──► Attempting ──► Succeeded
///                 │  ▲  └──► Failed
///                 ▼  │
///              Scheduled ──► Cancelled ◄── (Pending | Attempting)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Created, no attempt issued yet
    Pending,

    /// Waiting for the delay before the next attempt
    Scheduled,

    /// An attempt is in flight
    Attempting,

    /// An attempt succeeded
    Succeeded,

    /// Retry budget exhausted or the error was not retryable
    Failed,

    /// Cancelled by the caller or by controller shutdown
    Cancelled,
}

impl RequestState {
    /// Whether the request has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::Failed | RequestState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Pending, Attempting)
                | (Pending, Cancelled)
                | (Attempting, Succeeded)
                | (Attempting, Failed)
                | (Attempting, Scheduled)
                | (Attempting, Cancelled)
                | (Scheduled, Attempting)
                | (Scheduled, Cancelled)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Pending => "pending",
            RequestState::Scheduled => "scheduled",
            RequestState::Attempting => "attempting",
            RequestState::Succeeded => "succeeded",
            RequestState::Failed => "failed",
            RequestState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Snapshot of a logical request as held by the task tracker
#[derive(Debug, Clone)]
pub struct LogicalRequest {
    /// Stable identity
    pub key: RequestKey,

    /// The attempt currently (or most recently) associated with the request
    pub current_task: TaskId,

    /// Attempt number of `current_task` (1-indexed)
    pub attempt: u32,

    /// Retries left after the current attempt
    pub retries_remaining: u32,

    /// Retry budget fixed at creation
    pub total_retries_allowed: u32,

    /// Interval requested by the caller
    pub interval: Duration,

    /// Current lifecycle state
    pub state: RequestState,

    /// Delay before the next attempt, while scheduled
    pub next_delay: Option<Duration>,

    /// When the first attempt was issued
    pub started_at: Instant,
}

impl LogicalRequest {
    /// Metadata for a request whose first attempt is `task`
    pub fn new(key: RequestKey, task: TaskId, retries: u32, interval: Duration) -> Self {
        Self {
            key,
            current_task: task,
            attempt: 1,
            retries_remaining: retries,
            total_retries_allowed: retries,
            interval,
            state: RequestState::Attempting,
            next_delay: None,
            started_at: Instant::now(),
        }
    }

    /// Maximum number of attempts this request may make
    pub fn max_attempts(&self) -> u32 {
        self.total_retries_allowed.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_display() {
        assert_eq!(RequestKey::Task(TaskId(7)).to_string(), "task-7");
        assert_eq!(RequestKey::from("avatar").to_string(), "avatar");
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Succeeded.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
        assert!(!RequestState::Pending.is_terminal());
        assert!(!RequestState::Scheduled.is_terminal());
        assert!(!RequestState::Attempting.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use RequestState::*;
        assert!(Pending.can_transition_to(Attempting));
        assert!(Attempting.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Attempting));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Scheduled.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Attempting));
        assert!(!Failed.can_transition_to(Scheduled));
        assert!(!Pending.can_transition_to(Succeeded));
    }

    #[test]
    fn test_logical_request_new() {
        let req = LogicalRequest::new(
            RequestKey::Task(TaskId(1)),
            TaskId(1),
            2,
            Duration::from_secs(1),
        );
        assert_eq!(req.attempt, 1);
        assert_eq!(req.retries_remaining, 2);
        assert_eq!(req.total_retries_allowed, 2);
        assert_eq!(req.max_attempts(), 3);
        assert_eq!(req.state, RequestState::Attempting);
        assert!(req.next_delay.is_none());
    }
}
