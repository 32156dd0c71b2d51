//! Task tracker: logical request → current attempt bookkeeping
//!
//! Every in-flight logical request has exactly one entry, keyed by its
//! [`RequestKey`], pointing at its current [`TaskId`]. A reverse index lets
//! callers holding only an attempt's task id find the logical request.
//! Both maps live behind a single mutex so a retry swaps the current task
//! atomically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::types::{LogicalRequest, RequestKey, TaskId};

#[derive(Debug, Default)]
struct TrackerState {
    requests: HashMap<RequestKey, LogicalRequest>,
    tasks: HashMap<TaskId, RequestKey>,
}

impl TrackerState {
    fn insert(&mut self, task: TaskId, mut request: LogicalRequest) {
        request.current_task = task;
        if let Some(previous) = self.requests.get(&request.key) {
            if previous.current_task != task {
                self.tasks.remove(&previous.current_task);
            }
        }
        self.tasks.insert(task, request.key.clone());
        self.requests.insert(request.key.clone(), request);
    }
}

/// Shared table of in-flight logical requests
#[derive(Debug)]
pub struct TaskTracker {
    state: Mutex<TrackerState>,
    next_task: AtomicU64,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            next_task: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out a fresh attempt identifier
    pub fn issue_task_id(&self) -> TaskId {
        TaskId(self.next_task.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert or overwrite the entry for `request.key`, making `task` current
    ///
    /// The previous task of the same logical request is pruned from the
    /// reverse index in the same critical section.
    pub fn register(&self, task: TaskId, request: LogicalRequest) {
        tracing::trace!(request = %request.key, task = %task, "tracker register");
        self.lock().insert(task, request);
    }

    /// Register the first attempt of a new logical request
    ///
    /// Fails without modifying the table if the key is already in flight.
    pub fn register_new(&self, task: TaskId, request: LogicalRequest) -> Result<()> {
        let mut state = self.lock();
        if state.requests.contains_key(&request.key) {
            return Err(Error::duplicate_request_key(request.key.to_string()));
        }
        tracing::trace!(request = %request.key, task = %task, "tracker register new");
        state.insert(task, request);
        Ok(())
    }

    /// Remove the logical request whose current task is `task`
    ///
    /// A stale or unknown task is ignored, so duplicate completions are
    /// harmless.
    pub fn unregister(&self, task: TaskId) -> Option<LogicalRequest> {
        let mut state = self.lock();
        let key = state.tasks.remove(&task)?;
        let removed = state.requests.remove(&key);
        tracing::trace!(request = %key, task = %task, "tracker unregister");
        removed
    }

    /// Look up the logical request an attempt belongs to
    pub fn lookup(&self, task: TaskId) -> Option<LogicalRequest> {
        let state = self.lock();
        state
            .tasks
            .get(&task)
            .and_then(|key| state.requests.get(key))
            .cloned()
    }

    /// Look up a logical request by key
    pub fn get(&self, key: &RequestKey) -> Option<LogicalRequest> {
        self.lock().requests.get(key).cloned()
    }

    /// Mutate the entry whose current task is `task`
    ///
    /// Returns `false` if no such entry exists.
    pub fn update<F>(&self, task: TaskId, f: F) -> bool
    where
        F: FnOnce(&mut LogicalRequest),
    {
        let mut state = self.lock();
        let Some(key) = state.tasks.get(&task).cloned() else {
            return false;
        };
        match state.requests.get_mut(&key) {
            Some(request) => {
                f(request);
                true
            }
            None => false,
        }
    }

    /// Number of in-flight logical requests
    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    /// Whether no logical request is in flight
    pub fn is_empty(&self) -> bool {
        self.lock().requests.is_empty()
    }

    /// Copy of every tracked logical request
    pub fn snapshot(&self) -> Vec<LogicalRequest> {
        self.lock().requests.values().cloned().collect()
    }
}
