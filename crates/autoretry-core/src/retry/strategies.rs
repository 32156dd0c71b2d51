//! Delay calculators and retry predicates
//!
//! A `RetryDelayCalculator` decides how long a failed logical request waits
//! before its next attempt. A `RetryPredicate` decides whether it gets a next
//! attempt at all.

use crate::types::{BackoffPolicy, BackoffStrategy};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Inputs to a delay calculation
///
/// `retries_remaining` is the budget *before* the upcoming retry is spent,
/// so the first retry of a request created with 3 retries sees
/// `total_retries_allowed = 3, retries_remaining = 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayInput {
    /// Retry budget fixed when the request was created
    pub total_retries_allowed: u32,
    /// Retries left, including the one being scheduled
    pub retries_remaining: u32,
    /// Caller-configured modifier for custom backoff policies
    pub delay_modifier: u32,
    /// Interval requested for this logical request
    pub interval: Duration,
}

impl DelayInput {
    /// 1-indexed number of the retry being scheduled
    pub fn retry_number(&self) -> u32 {
        self.total_retries_allowed
            .saturating_sub(self.retries_remaining)
            .saturating_add(1)
    }

    fn modifier(&self) -> Duration {
        Duration::from_secs(u64::from(self.delay_modifier))
    }
}

/// Strategy computing the delay before the next attempt
///
/// Injected once into a [`RetryController`](super::RetryController) and
/// shared by every retry sequence it drives. Implementations must be pure.
pub trait RetryDelayCalculator: Send + Sync {
    /// Delay before the retry described by `input`
    fn delay(&self, input: &DelayInput) -> Duration;
}

impl<T: RetryDelayCalculator + ?Sized> RetryDelayCalculator for Arc<T> {
    fn delay(&self, input: &DelayInput) -> Duration {
        (**self).delay(input)
    }
}

impl<T: RetryDelayCalculator + ?Sized> RetryDelayCalculator for Box<T> {
    fn delay(&self, input: &DelayInput) -> Duration {
        (**self).delay(input)
    }
}

/// Constant spacing: the request's own interval, plus the modifier in seconds
///
/// With the default modifier of zero this returns the interval verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInterval;

impl RetryDelayCalculator for FixedInterval {
    fn delay(&self, input: &DelayInput) -> Duration {
        input.interval.saturating_add(input.modifier())
    }
}

/// Delay calculator driven by a configured [`BackoffPolicy`]
#[derive(Debug, Clone, Default)]
pub struct BackoffCalculator {
    policy: BackoffPolicy,
}

impl BackoffCalculator {
    /// Create a calculator for `policy`
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl RetryDelayCalculator for BackoffCalculator {
    fn delay(&self, input: &DelayInput) -> Duration {
        calculate_delay(&self.policy, input, self.policy.jitter)
    }
}

/// Adapter for closures with the `(total, remaining, modifier) -> seconds`
/// signature
///
/// ```rust
/// use autoretry_core::retry::{DelayFn, DelayInput, RetryDelayCalculator};
/// use std::time::Duration;
///
/// // 1s, 2s, 4s, ... independent of the requested interval
/// let doubling = DelayFn::new(|total, remaining, _modifier| 1u64 << (total - remaining));
///
/// let input = DelayInput {
///     total_retries_allowed: 3,
///     retries_remaining: 2,
///     delay_modifier: 0,
///     interval: Duration::ZERO,
/// };
/// assert_eq!(doubling.delay(&input), Duration::from_secs(2));
/// ```
pub struct DelayFn<F> {
    calc: F,
}

impl<F> DelayFn<F>
where
    F: Fn(u32, u32, u32) -> u64 + Send + Sync,
{
    /// Wrap `calc`
    pub fn new(calc: F) -> Self {
        Self { calc }
    }
}

impl<F> RetryDelayCalculator for DelayFn<F>
where
    F: Fn(u32, u32, u32) -> u64 + Send + Sync,
{
    fn delay(&self, input: &DelayInput) -> Duration {
        Duration::from_secs((self.calc)(
            input.total_retries_allowed,
            input.retries_remaining,
            input.delay_modifier,
        ))
    }
}

/// Calculate the delay before the next retry under a backoff policy
///
/// The request interval is the base. Linear backoff multiplies it by the
/// retry number, exponential by `multiplier^(retry_number - 1)`. The
/// modifier is added in seconds, the result is capped at `max_delay_secs`,
/// and jitter adds up to 25% on top.
///
/// # Example
///
/// ```rust
/// use autoretry_core::retry::{calculate_delay, DelayInput};
/// use autoretry_core::types::{BackoffPolicy, BackoffStrategy};
/// use std::time::Duration;
///
/// let policy = BackoffPolicy {
///     strategy: BackoffStrategy::Exponential,
///     multiplier: 2.0,
///     max_delay_secs: 60,
///     jitter: false,
/// };
/// let mut input = DelayInput {
///     total_retries_allowed: 3,
///     retries_remaining: 3,
///     delay_modifier: 0,
///     interval: Duration::from_secs(1),
/// };
///
/// assert_eq!(calculate_delay(&policy, &input, false), Duration::from_secs(1));
/// input.retries_remaining = 1;
/// assert_eq!(calculate_delay(&policy, &input, false), Duration::from_secs(4));
/// ```
pub fn calculate_delay(policy: &BackoffPolicy, input: &DelayInput, jitter: bool) -> Duration {
    let retry_index = input.retry_number().saturating_sub(1);

    let base = match policy.strategy {
        BackoffStrategy::Fixed => input.interval,

        BackoffStrategy::Linear => input.interval.saturating_mul(retry_index.saturating_add(1)),

        BackoffStrategy::Exponential => {
            let factor = policy
                .multiplier
                .powi(i32::try_from(retry_index).unwrap_or(i32::MAX));
            Duration::try_from_secs_f64(input.interval.as_secs_f64() * factor)
                .unwrap_or_else(|_| policy.max_delay())
        }
    };

    let capped = base
        .saturating_add(input.modifier())
        .min(policy.max_delay());

    if jitter && !capped.is_zero() {
        let jitter_range = u64::try_from(capped.as_millis() / 4).unwrap_or(u64::MAX);
        let jitter_value = rand::rng().random_range(0..=jitter_range);
        capped.saturating_add(Duration::from_millis(jitter_value))
    } else {
        capped
    }
}

/// Decides whether a failed attempt may be retried
///
/// The default, [`AlwaysRetry`], treats every failure alike. Anything else
/// is an opt-in refinement: a rejected error ends the logical request with
/// [`RetryError::NonRetryable`](super::RetryError::NonRetryable).
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// No error is retryable; the first failure is terminal
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate backed by a closure
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Errors that may carry an HTTP status code
pub trait HttpStatusError {
    /// The response status, if the failure came from a response at all
    fn status_code(&self) -> Option<u16>;
}

/// Retries only on transient HTTP statuses
///
/// Failures without a status (connect errors, timeouts, resets) stay
/// retryable.
#[derive(Debug, Clone)]
pub struct HttpStatusPredicate {
    retryable_codes: Vec<u16>,
}

impl HttpStatusPredicate {
    /// Retry on 408, 425, 429, 500, 502, 503 and 504
    pub fn default_http() -> Self {
        Self::with_codes(vec![408, 425, 429, 500, 502, 503, 504])
    }

    /// Retry on the given status codes only
    pub fn with_codes(codes: Vec<u16>) -> Self {
        Self {
            retryable_codes: codes,
        }
    }

    /// Check if a status code is retryable
    pub fn is_retryable_code(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }
}

impl Default for HttpStatusPredicate {
    fn default() -> Self {
        Self::default_http()
    }
}

impl<E: HttpStatusError> RetryPredicate<E> for HttpStatusPredicate {
    fn should_retry(&self, error: &E) -> bool {
        error
            .status_code()
            .is_none_or(|code| self.is_retryable_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn input(total: u32, remaining: u32, interval_secs: u64) -> DelayInput {
        DelayInput {
            total_retries_allowed: total,
            retries_remaining: remaining,
            delay_modifier: 0,
            interval: Duration::from_secs(interval_secs),
        }
    }

    fn policy(strategy: BackoffStrategy) -> BackoffPolicy {
        BackoffPolicy {
            strategy,
            multiplier: 2.0,
            max_delay_secs: 30,
            jitter: false,
        }
    }

    #[test]
    fn test_retry_number() {
        assert_eq!(input(3, 3, 1).retry_number(), 1);
        assert_eq!(input(3, 2, 1).retry_number(), 2);
        assert_eq!(input(3, 1, 1).retry_number(), 3);
    }

    #[test]
    fn test_fixed_interval_is_verbatim() {
        let calc = FixedInterval;
        assert_eq!(calc.delay(&input(5, 5, 3)), Duration::from_secs(3));
        assert_eq!(calc.delay(&input(5, 1, 3)), Duration::from_secs(3));
        assert_eq!(calc.delay(&input(1, 1, 0)), Duration::ZERO);
    }

    #[test]
    fn test_fixed_interval_adds_modifier() {
        let calc = FixedInterval;
        let mut with_modifier = input(2, 2, 1);
        with_modifier.delay_modifier = 4;
        assert_eq!(calc.delay(&with_modifier), Duration::from_secs(5));
    }

    #[test]
    fn test_linear_strategy() {
        let policy = policy(BackoffStrategy::Linear);
        assert_eq!(calculate_delay(&policy, &input(3, 3, 2), false), Duration::from_secs(2));
        assert_eq!(calculate_delay(&policy, &input(3, 2, 2), false), Duration::from_secs(4));
        assert_eq!(calculate_delay(&policy, &input(3, 1, 2), false), Duration::from_secs(6));
    }

    #[test]
    fn test_exponential_strategy() {
        let policy = policy(BackoffStrategy::Exponential);
        assert_eq!(calculate_delay(&policy, &input(4, 4, 1), false), Duration::from_secs(1));
        assert_eq!(calculate_delay(&policy, &input(4, 3, 1), false), Duration::from_secs(2));
        assert_eq!(calculate_delay(&policy, &input(4, 2, 1), false), Duration::from_secs(4));
        assert_eq!(calculate_delay(&policy, &input(4, 1, 1), false), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = policy(BackoffStrategy::Exponential);
        // 1s * 2^9 = 512s, capped at 30s
        assert_eq!(
            calculate_delay(&policy, &input(10, 1, 1), false),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_exponential_overflow_falls_back_to_cap() {
        let policy = BackoffPolicy {
            multiplier: 1.0e300,
            ..policy(BackoffStrategy::Exponential)
        };
        assert_eq!(
            calculate_delay(&policy, &input(50, 1, 10), false),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = policy(BackoffStrategy::Fixed);
        for _ in 0..100 {
            let delay = calculate_delay(&policy, &input(3, 3, 4), true);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5)); // base + 25%
        }
    }

    #[test]
    fn test_jitter_no_effect_on_zero_delay() {
        let policy = policy(BackoffStrategy::Exponential);
        assert_eq!(calculate_delay(&policy, &input(3, 3, 0), true), Duration::ZERO);
    }

    #[test]
    fn test_delay_fn_receives_original_signature() {
        let calc = DelayFn::new(|total, remaining, modifier| {
            u64::from(total) * 100 + u64::from(remaining) * 10 + u64::from(modifier)
        });
        let mut args = input(3, 2, 99);
        args.delay_modifier = 7;
        assert_eq!(calc.delay(&args), Duration::from_secs(327));
    }

    #[test]
    fn test_boxed_calculator() {
        let calc: Box<dyn RetryDelayCalculator> = Box::new(FixedInterval);
        assert_eq!(calc.delay(&input(1, 1, 2)), Duration::from_secs(2));
    }

    #[test]
    fn test_always_and_never_retry() {
        let error = io::Error::new(io::ErrorKind::NotFound, "not found");
        assert!(AlwaysRetry.should_retry(&error));
        assert!(!NeverRetry.should_retry(&error));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = ClosurePredicate::new(|err: &io::Error| {
            matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            )
        });

        assert!(predicate.should_retry(&io::Error::new(io::ErrorKind::TimedOut, "timeout")));
        assert!(!predicate.should_retry(&io::Error::new(io::ErrorKind::NotFound, "missing")));
    }

    struct StatusOnly(Option<u16>);

    impl HttpStatusError for StatusOnly {
        fn status_code(&self) -> Option<u16> {
            self.0
        }
    }

    #[test]
    fn test_http_status_predicate() {
        let predicate = HttpStatusPredicate::default_http();

        assert!(predicate.should_retry(&StatusOnly(Some(503))));
        assert!(predicate.should_retry(&StatusOnly(Some(429))));
        assert!(predicate.should_retry(&StatusOnly(None)));
        assert!(!predicate.should_retry(&StatusOnly(Some(404))));
        assert!(!predicate.should_retry(&StatusOnly(Some(401))));
    }
}
