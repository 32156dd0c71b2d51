//! Retry orchestration for asynchronous operations
//!
//! A *logical request* is one caller-visible operation. It is carried out by
//! one or more *attempts*, each running as its own tokio task with its own
//! [`TaskId`](crate::types::TaskId). The [`RetryController`] issues attempts,
//! waits out delays between them and reports exactly one outcome per logical
//! request. The [`TaskTracker`] maps the in-flight attempt of every logical
//! request back to that request.
//!
//! # Features
//!
//! - Non-blocking: `execute` returns as soon as the first attempt is issued
//! - Pluggable delay calculation via [`RetryDelayCalculator`]
//! - Optional retryability filtering via [`RetryPredicate`]
//! - Per-request cancellation and per-attempt abort
//! - Observable lifecycle via the [`RetryObserver`] trait
//!
//! # Example
//!
//! ```rust,no_run
//! use autoretry_core::retry::{RetryController, RetryOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> autoretry_core::Result<()> {
//! let controller = RetryController::new();
//! let handle = controller.execute(
//!     RetryOptions::new(3).with_interval(Duration::from_secs(1)),
//!     || async { Ok::<_, std::io::Error>("done") },
//! )?;
//!
//! match handle.await {
//!     Ok(value) => println!("{value}"),
//!     Err(err) => eprintln!("gave up after {} attempts: {err}", err.attempts()),
//! }
//! # Ok(())
//! # }
//! ```

mod controller;
mod error;
mod handle;
mod observer;
mod strategies;
mod tracker;

pub use controller::{RetryController, RetryControllerBuilder, RetryOptions};
pub use error::{AttemptInterrupted, RetryError};
pub use handle::{AttemptHandle, RequestControl, RequestHandle};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{
    calculate_delay, AlwaysRetry, BackoffCalculator, ClosurePredicate, DelayFn, DelayInput,
    FixedInterval, HttpStatusError, HttpStatusPredicate, NeverRetry,
    RetryDelayCalculator, RetryPredicate,
};
pub use tracker::TaskTracker;
