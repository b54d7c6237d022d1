//! Retry policy: whether a failed chunk attempt is tried again, and after how long.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ErrorKind, ProcessError};

/// Exponential backoff between chunk attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_interval: Duration,

    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_interval: Duration,
}

impl BackoffPolicy {
    pub fn new(initial_interval: Duration, multiplier: f64, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier,
            max_interval,
        }
    }

    /// Delay after failed attempt `attempt` (1-indexed).
    ///
    /// delay = initial_interval * multiplier^(attempt - 1), capped at
    /// `max_interval`. With 2000ms and 2.0:
    /// - attempt 1: 2000ms
    /// - attempt 2: 4000ms
    /// - attempt 3: 8000ms
    ///
    /// Attempt 0 is treated as attempt 1.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.initial_interval.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let cap_ms = self.max_interval.as_millis() as f64;

        if !delay_ms.is_finite() || delay_ms >= cap_ms {
            return self.max_interval;
        }
        Duration::from_millis(delay_ms.max(0.0).round() as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000), 2.0, Duration::from_millis(30_000))
    }
}

/// Which error kinds are worth another attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Every kind is retryable.
    #[default]
    All,

    /// Only the listed kinds; everything else fails the chunk immediately.
    Kinds(Vec<ErrorKind>),
}

impl RetryOn {
    pub fn transient_only() -> Self {
        RetryOn::Kinds(vec![
            ErrorKind::Transient,
            ErrorKind::Timeout,
            ErrorKind::Unavailable,
        ])
    }

    pub fn allows(&self, kind: ErrorKind) -> bool {
        match self {
            RetryOn::All => true,
            RetryOn::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Retry policy for chunk attempts.
///
/// `limit` counts attempts in total, the first one included: a limit of 3
/// allows up to 2 retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub backoff: BackoffPolicy,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(limit: u32, backoff: BackoffPolicy, retry_on: RetryOn) -> Self {
        Self {
            limit,
            backoff,
            retry_on,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, BackoffPolicy::default(), RetryOn::All)
    }

    /// Whether attempt number `attempt` (1-indexed), which failed with
    /// `error`, may be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &ProcessError) -> bool {
        attempt < self.limit && self.retry_on.allows(error.kind)
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.backoff.next_delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, BackoffPolicy::default(), RetryOn::All)
    }
}

/// Per-chunk retry state. Lives for one chunk execution only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryContext {
    /// Attempts started so far.
    pub attempt: u32,

    pub last_error: Option<ProcessError>,

    /// Whether `last_error` came from a fatal failure.
    pub fatal: bool,

    /// Delay chosen before the next attempt, if one was scheduled.
    pub next_delay: Option<Duration>,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.next_delay = None;
        self.attempt
    }

    pub fn record_failure(&mut self, error: ProcessError, fatal: bool) {
        self.last_error = Some(error);
        self.fatal = fatal;
    }

    /// Retries performed so far.
    pub fn retries(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_policy_matches_the_reference_configuration() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.limit, 3);
        assert_eq!(policy.backoff.initial_interval, Duration::from_millis(2000));
        assert_eq!(policy.backoff.multiplier, 2.0);
        assert_eq!(policy.retry_on, RetryOn::All);
    }

    #[test]
    fn delays_between_three_attempts_are_exactly_2s_then_4s() {
        let policy = RetryPolicy::default();
        let error = ProcessError::transient("boom");

        let mut delays = Vec::new();
        let mut attempt = 1;
        while policy.should_retry(attempt, &error) {
            delays.push(policy.next_delay(attempt));
            attempt += 1;
        }

        assert_eq!(
            delays,
            vec![Duration::from_millis(2000), Duration::from_millis(4000)]
        );
        assert_eq!(attempt, 3);
    }

    #[rstest]
    #[case::zero_is_first(0, 2000)]
    #[case::first(1, 2000)]
    #[case::third(3, 8000)]
    #[case::capped(5, 30_000)]
    #[case::huge_exponent(u32::MAX, 30_000)]
    fn backoff_is_exponential_and_capped(#[case] attempt: u32, #[case] expected_ms: u64) {
        let backoff = BackoffPolicy::default();
        assert_eq!(backoff.next_delay(attempt), Duration::from_millis(expected_ms));
    }

    #[rstest]
    #[case::all_retries_invalid(RetryOn::All, ErrorKind::Invalid, true)]
    #[case::allow_list_hit(RetryOn::transient_only(), ErrorKind::Timeout, true)]
    #[case::allow_list_miss(RetryOn::transient_only(), ErrorKind::Invalid, false)]
    #[case::sink_not_listed(RetryOn::Kinds(vec![ErrorKind::Transient]), ErrorKind::Sink, false)]
    fn retry_on_filters_by_kind(
        #[case] retry_on: RetryOn,
        #[case] kind: ErrorKind,
        #[case] expected: bool,
    ) {
        let policy = RetryPolicy::new(3, BackoffPolicy::default(), retry_on);
        assert_eq!(policy.should_retry(1, &ProcessError::new(kind, "x")), expected);
    }

    #[test]
    fn no_retry_policy_gives_up_after_first_attempt() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(1, &ProcessError::transient("x")));
    }

    #[test]
    fn context_counts_attempts_and_retries() {
        let mut ctx = RetryContext::new();
        assert_eq!(ctx.begin_attempt(), 1);
        ctx.record_failure(ProcessError::transient("first"), false);
        ctx.next_delay = Some(Duration::from_millis(2000));

        assert_eq!(ctx.begin_attempt(), 2);
        assert_eq!(ctx.next_delay, None);
        assert_eq!(ctx.retries(), 1);
        assert_eq!(ctx.last_error, Some(ProcessError::transient("first")));
    }

    #[test]
    fn retry_on_reads_from_config_values() {
        let all: RetryOn = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, RetryOn::All);

        let kinds: RetryOn = serde_json::from_str(r#"{"kinds":["transient","timeout"]}"#).unwrap();
        assert_eq!(kinds, RetryOn::Kinds(vec![ErrorKind::Transient, ErrorKind::Timeout]));
    }
}
