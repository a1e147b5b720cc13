//! Time source for the latest-height cache.

use chrono::{DateTime, Duration, Utc};

/// Provides the current wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// True when something fetched at `fetched_at` is at most `ttl` old at `now`.
pub fn is_fresh(now: DateTime<Utc>, fetched_at: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(fetched_at) <= ttl
}

/// A cached chain height and when it was fetched.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeightCache {
    entry: Option<(u64, DateTime<Utc>)>,
}

impl HeightCache {
    pub fn height(&self) -> Option<u64> {
        self.entry.map(|(height, _)| height)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.entry.map(|(_, at)| at)
    }

    pub fn set(&mut self, height: u64, now: DateTime<Utc>) {
        self.entry = Some((height, now));
    }

    /// The cached height if it was fetched no more than `ttl` before `now`.
    pub fn fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Option<u64> {
        let (height, at) = self.entry?;
        is_fresh(now, at, ttl).then_some(height)
    }
}
