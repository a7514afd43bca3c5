use chrono::{DateTime, Utc};

/// Monotonic-enough wall-clock source, injectable for tests.
///
/// The spec asks only for `Now()`; we expose both the `DateTime` (for object
/// TTL comparisons in the expired-object deleter) and the unix-seconds form
/// the oracle's output annotations carry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
