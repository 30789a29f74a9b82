//! Where `lastPlayed` and registration stamps come from.

use chrono::{DateTime, Duration, Utc};

/// Time source handed to every service that stamps records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock UTC.
    #[default]
    System,
    /// Always reports the same instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// `now()` shifted back by whole days.
    #[must_use]
    pub fn days_ago(&self, days: i64) -> DateTime<Utc> {
        self.now() - Duration::days(days)
    }
}

/// Seconds since the epoch of the instant reported by [`fixed_clock`]
/// (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// A clock frozen at [`fixed_now`], for deterministic stamps in tests.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
