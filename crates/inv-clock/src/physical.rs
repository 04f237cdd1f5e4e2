//! Physical time sources.
//!
//! The HLC and the quorum monitor never read the system clock directly; they
//! go through [`PhysicalClock`]. Production wiring uses [`SystemClock`];
//! deterministic tests and the CLI simulations use [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock readings in nanoseconds.
pub trait PhysicalClock: Send + Sync {
    /// Current reading in nanoseconds since an arbitrary, fixed epoch.
    fn now_nanos(&self) -> u64;
}

/// Unix-epoch wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now_nanos(&self) -> u64 {
        // A clock set before 1970 reads as 0; the HLC then runs on its
        // logical counter until wall time catches up.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos().min(u64::MAX as u128) as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(start_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(start_nanos),
        }
    }

    /// Move the clock forward by `d` (saturating).
    pub fn advance(&self, d: Duration) {
        let step = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(cur.saturating_add(step))
            });
    }

    /// Jump to an absolute reading. May move backwards (simulates NTP steps).
    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl PhysicalClock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
