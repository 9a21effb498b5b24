//! Store clock
//!
//! Every visibility comparison uses the store's clock, never the caller's.
//! A store reports its time the way `TIME` does on a key-value server: whole
//! seconds plus the microseconds elapsed within the current second.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// A point in time as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreTime {
    /// Unix seconds
    pub seconds: u64,
    /// Microseconds within the current second (`0..1_000_000`)
    pub micros: u32,
}

impl StoreTime {
    pub fn new(seconds: u64, micros: u32) -> Self {
        debug_assert!(u64::from(micros) < MICROS_PER_SECOND);
        Self { seconds, micros }
    }

    pub fn from_unix_micros(total: u64) -> Self {
        Self {
            seconds: total / MICROS_PER_SECOND,
            micros: (total % MICROS_PER_SECOND) as u32,
        }
    }

    pub fn from_unix_millis(ms: u64) -> Self {
        Self::from_unix_micros(ms.saturating_mul(1000))
    }

    /// Microseconds since the epoch
    pub fn as_unix_micros(&self) -> u64 {
        self.seconds * MICROS_PER_SECOND + u64::from(self.micros)
    }

    /// Milliseconds since the epoch, the unit of every score comparison
    pub fn as_unix_millis(&self) -> u64 {
        self.seconds * 1000 + u64::from(self.micros) / 1000
    }

    /// Microseconds past the current millisecond (`0..1000`)
    pub fn sub_millis_micros(&self) -> u32 {
        self.micros % 1000
    }
}

/// Source of the store's current time
pub trait Clock: Send + Sync {
    fn now(&self) -> StoreTime;
}

/// Wall clock of the host running the store
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> StoreTime {
        let now = chrono::Utc::now();
        StoreTime::new(
            u64::try_from(now.timestamp()).unwrap_or(0),
            now.timestamp_subsec_micros().min(999_999),
        )
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start: StoreTime) -> Self {
        Self {
            micros: AtomicU64::new(start.as_unix_micros()),
        }
    }

    pub fn set(&self, time: StoreTime) {
        self.micros.store(time.as_unix_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> StoreTime {
        StoreTime::from_unix_micros(self.micros.load(Ordering::SeqCst))
    }
}
