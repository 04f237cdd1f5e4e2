use std::time::Duration;

use rand::Rng;

use crate::retry::uniform;

/// How long a transaction waits between read and validation.
///
/// The wait covers the clock uncertainty window so a committed write is
/// never observed out of real-time order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitWait {
    None,
    Fixed(Duration),
    Uniform { min: Duration, max: Duration },
}

impl CommitWait {
    /// `[min, max]` bounds from configuration; equal bounds mean a fixed wait.
    pub fn from_bounds(min: Duration, max: Duration) -> Self {
        if max.is_zero() {
            CommitWait::None
        } else if min >= max {
            CommitWait::Fixed(max)
        } else {
            CommitWait::Uniform { min, max }
        }
    }

    /// A caller-supplied uncertainty `ε` means the true time lies somewhere in
    /// `[t - ε, t + ε]`; waiting `2ε` outlasts the whole interval.
    pub fn for_uncertainty(epsilon: Duration) -> Duration {
        epsilon.saturating_mul(2)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match self {
            CommitWait::None => Duration::ZERO,
            CommitWait::Fixed(d) => *d,
            CommitWait::Uniform { min, max } => uniform(*min, *max, rng),
        }
    }
}
