//! Wall-clock access.
//!
//! Nothing in the engine runs on a timer. Every time-sensitive transition
//! (activation, due-date arrival, month rollover, credit expiry) is evaluated
//! against the instant captured when an operation starts.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::model::MonthKey;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn current_month(&self) -> MonthKey {
        MonthKey::from_date(self.today())
    }
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Start at midnight UTC on the given date.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock() = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let clock = ManualClock::on(start);
        assert_eq!(clock.today(), start);
        assert_eq!(clock.current_month().to_string(), "2026-01");

        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(clock.current_month().to_string(), "2026-02");
    }

    #[test]
    fn test_manual_clock_set_date() {
        let clock = ManualClock::on(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let later = NaiveDate::from_ymd_opt(2027, 6, 15).unwrap();
        clock.set_date(later);
        assert_eq!(clock.today(), later);
    }
}
