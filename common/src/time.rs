//! Time utilities and constants.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Default quote validity (5 minutes).
    pub fn default_quote_ttl() -> Duration {
        Duration::minutes(5)
    }

    /// Longest validity a provider may request (10 minutes).
    pub fn max_quote_ttl() -> Duration {
        Duration::minutes(10)
    }

    /// Default validity of provider-side balance cache entries (30 seconds).
    pub fn balance_cache_ttl() -> Duration {
        Duration::seconds(30)
    }

    /// Default interval of the background cache sweeper (60 seconds).
    pub fn cache_sweep_interval() -> Duration {
        Duration::seconds(60)
    }
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Source of the current time.
///
/// Expiry decisions go through a clock so they can be tested without
/// sleeping.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the current wall time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    /// Set the clock to an exact instant.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::starting_now();
        let start = clock.now();

        clock.advance(Duration::minutes(5) + Duration::milliseconds(1));

        assert_eq!(clock.now() - start, Duration::milliseconds(300_001));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_ttl_bounds() {
        assert!(constants::default_quote_ttl() <= constants::max_quote_ttl());
    }
}
