//! Bounded retry with pluggable backoff.
//!
//! The OCC loop is expressed as `RetryPolicy::run` over a single-attempt
//! future, so attempt counting and backoff live in one place.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;

/// Delay before the next attempt after a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    /// Uniform in `[min, max]`.
    Jittered { min: Duration, max: Duration },
    /// `base * 2^(attempt-1)`, capped.
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Jittered { min, max } => uniform(*min, *max, rng),
            Backoff::Exponential { base, cap } => {
                let shift = attempt.saturating_sub(1).min(31);
                base.saturating_mul(1u32 << shift).min(*cap)
            }
        }
    }
}

/// Uniform duration in `[min, max]` at nanosecond resolution.
pub(crate) fn uniform<R: Rng + ?Sized>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    if max <= min {
        return min;
    }
    let lo = min.as_nanos().min(u64::MAX as u128) as u64;
    let hi = max.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(rng.gen_range(lo..=hi))
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Terminal: stop retrying.
    Done(T),
    /// Lost a race; eligible for another attempt.
    Conflict,
}

/// Result of a whole retry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retried<T> {
    Done { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Drive `op(attempt)` until it returns `Done` or attempts run out.
    /// No backoff follows the final attempt.
    pub async fn run<T, F, Fut>(&self, rng: &Mutex<StdRng>, mut op: F) -> Retried<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max = self.max_attempts.max(1);
        for attempt in 1..=max {
            match op(attempt).await {
                Attempt::Done(value) => {
                    return Retried::Done {
                        value,
                        attempts: attempt,
                    }
                }
                Attempt::Conflict if attempt < max => {
                    let delay = {
                        let mut rng = rng.lock();
                        self.backoff.delay(attempt, &mut *rng)
                    };
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Attempt::Conflict => {}
            }
        }
        Retried::Exhausted { attempts: max }
    }
}
