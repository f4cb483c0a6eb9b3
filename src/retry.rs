//! Retry with linear backoff for remote calls.
//!
//! Every read against the movie API goes through [`RetryPolicy::run`], which
//! resolves to a tagged [`Outcome`]. Cancellation is its own variant so callers
//! never have to inspect error messages to tell an aborted request from a
//! failed one.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MarqueeError, Result};

/// Final result of a (possibly retried) request.
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    Failed(MarqueeError),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Failed(err) => Outcome::Failed(err),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit; the n-th retry waits `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff * retry
    }

    /// Run `op` until it succeeds, fails terminally, runs out of retries, or
    /// `cancel` fires. Cancellation is observed both while a request is in
    /// flight and while waiting out a backoff.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Cancelled,
                result = op() => result,
            };

            match result {
                Ok(value) => return Outcome::Done(value),
                Err(err) if err.is_retriable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(error = %err, retry, delay_ms = delay.as_millis() as u64, "retrying request");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Outcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    debug!(error = %err, "request failed");
                    return Outcome::Failed(err);
                }
            }
        }
    }
}
