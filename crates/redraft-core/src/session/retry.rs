//! Retry state machine for store calls.
//!
//! Each attempt is classified as `Success`, `Conflict`, `TransientFail` or
//! `GiveUp`. Conflicts and transient failures spend one retry from the
//! policy's budget and wait out an exponential backoff; once the budget is
//! gone the last error is surfaced, with a conflict promoted to
//! [`Error::ModifiedElsewhere`].

use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};

#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// Stale expected version: refetch the tip and reapply
    Conflict(Error),
    /// Timeout or backend hiccup: back off and try again
    TransientFail(Error),
    /// Anything a retry cannot fix
    GiveUp(Error),
}

impl<T> AttemptOutcome<T> {
    pub fn classify(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) if error.is_conflict() => Self::Conflict(error),
            Err(error) if error.is_transient() => Self::TransientFail(error),
            Err(error) => Self::GiveUp(error),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
}

impl RetryState {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Spend one retry, returning how long to wait first. `None` once the
    /// budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        Some(self.policy.backoff(self.retries))
    }

    pub const fn retries(&self) -> u32 {
        self.retries
    }
}

/// Final error once retries are spent.
pub fn exhausted(error: Error, retries: u32) -> Error {
    match error {
        Error::Conflict { id, expected } => Error::ModifiedElsewhere(format!(
            "draft {id} moved past version {expected} and kept changing after {retries} retries"
        )),
        other => other,
    }
}
