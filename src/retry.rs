//! Failure classification and the bounded exponential-backoff policy.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use reqwest::StatusCode;

use crate::ClientOptions;

/// Classification of a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    /// Response status 502 or 503.
    Gateway,
    /// The attempt did not complete within its timeout.
    Timeout,
    /// The request failed before any response was received.
    Network,
    /// Anything else. Never retried.
    NonTransient,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match StatusCode::from_u16(status) {
            Ok(StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE) => Self::Gateway,
            _ => Self::NonTransient,
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }
        // is_connect() is not available on wasm32 targets (no TCP); a failed
        // fetch surfaces as a request error there.
        #[cfg(not(target_arch = "wasm32"))]
        let connect = err.is_connect();
        #[cfg(target_arch = "wasm32")]
        let connect = false;

        if connect || err.is_request() {
            Self::Network
        } else {
            Self::NonTransient
        }
    }

    pub fn is_transient(self) -> bool {
        !matches!(self, Self::NonTransient)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::NonTransient => "non_transient",
        }
    }
}

/// What to do after a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then re-issue the request. `retry` is 1-based.
    Retry { retry: u32, delay: Duration },
    /// Transient failure, but the retry budget is spent.
    Exhausted,
    /// Transient failure, but the backoff would run past the deadline.
    DeadlineReached,
    /// Non-transient failure.
    Surface,
}

/// Retry limits and backoff curve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

impl RetryPolicy {
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            base_delay_ms: options.base_delay_ms,
            backoff_multiplier: options.backoff_multiplier,
        }
    }

    /// Backoff before retry number `retry` (1-based):
    /// `base × multiplier^(retry − 1)`, saturating.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1);
        let factor = u64::from(self.backoff_multiplier).saturating_pow(exp);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Decides the next step given the current consecutive-retry counter.
    pub fn decide(&self, kind: FailureKind, counter: u32) -> RetryDecision {
        if !kind.is_transient() {
            return RetryDecision::Surface;
        }
        if counter >= self.max_retries {
            return RetryDecision::Exhausted;
        }
        let retry = counter + 1;
        RetryDecision::Retry {
            retry,
            delay: self.delay_for(retry),
        }
    }
}

/// Consecutive-retry counter shared by every request of a client instance.
///
/// Incremented on each retry, reset by any successful response.
#[derive(Debug, Default)]
pub struct SharedRetryCounter(AtomicU32);

impl SharedRetryCounter {
    pub fn current(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// Increments the counter if it is below `max`, returning the new value.
    pub fn try_acquire(&self, max: u32) -> Option<u32> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    /// Takes the next retry slot only if its backoff fits in `remaining`.
    ///
    /// A refused retry leaves the counter untouched.
    fn acquire(&self, policy: &RetryPolicy, remaining: Option<Duration>) -> RetryDecision {
        let mut out_of_time = false;
        let acquired = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                out_of_time = false;
                if current >= policy.max_retries {
                    return None;
                }
                if !fits(policy.delay_for(current + 1), remaining) {
                    out_of_time = true;
                    return None;
                }
                Some(current + 1)
            });
        match acquired {
            Ok(previous) => RetryDecision::Retry {
                retry: previous + 1,
                delay: policy.delay_for(previous + 1),
            },
            Err(_) if out_of_time => RetryDecision::DeadlineReached,
            Err(_) => RetryDecision::Exhausted,
        }
    }
}

fn fits(delay: Duration, remaining: Option<Duration>) -> bool {
    remaining.map_or(true, |remaining| delay < remaining)
}

/// Retry bookkeeping for one request chain.
#[derive(Debug)]
pub(crate) struct RetryState<'a> {
    policy: RetryPolicy,
    shared: Option<&'a SharedRetryCounter>,
    performed: u32,
}

impl<'a> RetryState<'a> {
    pub(crate) fn per_request(policy: RetryPolicy) -> Self {
        Self {
            policy,
            shared: None,
            performed: 0,
        }
    }

    pub(crate) fn shared(policy: RetryPolicy, counter: &'a SharedRetryCounter) -> Self {
        Self {
            policy,
            shared: Some(counter),
            performed: 0,
        }
    }

    /// Retries this chain has performed so far.
    pub(crate) fn performed(&self) -> u32 {
        self.performed
    }

    pub(crate) fn on_success(&self) {
        if let Some(counter) = self.shared {
            counter.reset();
        }
    }

    /// `remaining` is the time left before the chain's deadline, if any.
    pub(crate) fn on_failure(
        &mut self,
        kind: FailureKind,
        remaining: Option<Duration>,
    ) -> RetryDecision {
        let decision = match self.shared {
            None => match self.policy.decide(kind, self.performed) {
                RetryDecision::Retry { delay, .. } if !fits(delay, remaining) => {
                    RetryDecision::DeadlineReached
                }
                decision => decision,
            },
            Some(_) if !kind.is_transient() => RetryDecision::Surface,
            Some(counter) => counter.acquire(&self.policy, remaining),
        };
        if matches!(decision, RetryDecision::Retry { .. }) {
            self.performed += 1;
        }
        decision
    }
}
