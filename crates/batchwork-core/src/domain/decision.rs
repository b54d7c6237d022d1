//! Decision model: what happens to a chunk after a failed attempt.

use std::time::Duration;

use crate::retry::{RetryContext, RetryPolicy};

/// The next action for a chunk whose attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Sleep for `delay`, then re-run the whole chunk.
    Retry { delay: Duration, reason: String },

    /// Abandon the chunk.
    GiveUp { reason: String },
}

/// Decides the next action from the chunk's retry state.
///
/// Deciders are pure: the step executor carries out the decision.
pub trait Decider: Send + Sync {
    fn decide(&self, ctx: &RetryContext) -> Decision;
}

/// Decider backed by a [`RetryPolicy`].
///
/// - Fatal failures give up immediately.
/// - Retryable failures retry while the policy allows it, waiting
///   `next_delay(attempt)`.
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, ctx: &RetryContext) -> Decision {
        let Some(error) = ctx.last_error.as_ref() else {
            return Decision::GiveUp {
                reason: "no failure recorded".to_string(),
            };
        };

        if ctx.fatal {
            return Decision::GiveUp {
                reason: format!("fatal {} failure on attempt {}", error.kind, ctx.attempt),
            };
        }

        if !self.retry_policy.retry_on.allows(error.kind) {
            return Decision::GiveUp {
                reason: format!("{} failures are not retryable", error.kind),
            };
        }

        if !self.retry_policy.should_retry(ctx.attempt, error) {
            return Decision::GiveUp {
                reason: format!(
                    "retry limit reached: {}/{}",
                    ctx.attempt, self.retry_policy.limit
                ),
            };
        }

        let delay = self.retry_policy.next_delay(ctx.attempt);
        Decision::Retry {
            delay,
            reason: format!(
                "retry attempt {}/{} after {:?}",
                ctx.attempt + 1,
                self.retry_policy.limit,
                delay
            ),
        }
    }
}
