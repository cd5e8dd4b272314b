use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

/// Hands out human readable ride numbers of the form `RIDE_20240115_007`.
///
/// The counter restarts every UTC day. It must be seeded with the highest
/// number already stored for the day before it hands out numbers, so a
/// restarted process continues where the previous one stopped.
#[derive(Debug, Default)]
pub struct RideNumberGenerator {
    state: Mutex<Option<(NaiveDate, u32)>>,
}

impl RideNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared prefix of every number issued on `now`'s day.
    pub fn prefix(now: DateTime<Utc>) -> String {
        format!("RIDE_{}_", now.date_naive().format("%Y%m%d"))
    }

    pub fn is_seeded_for(&self, now: DateTime<Utc>) -> bool {
        matches!(*self.lock(), Some((day, _)) if day == now.date_naive())
    }

    /// Moves the counter past `latest`, the highest number stored for the day.
    /// Never moves it backwards.
    pub fn seed(&self, now: DateTime<Utc>, latest: Option<&str>) {
        let today = now.date_naive();
        let stored = latest
            .and_then(|number| number.strip_prefix(&Self::prefix(now)))
            .and_then(|sequence| sequence.parse::<u32>().ok())
            .unwrap_or(0);

        let mut state = self.lock();
        let current = match *state {
            Some((day, last)) if day == today => last,
            _ => 0,
        };
        *state = Some((today, current.max(stored)));
    }

    pub fn next(&self, now: DateTime<Utc>) -> String {
        let today = now.date_naive();
        let mut state = self.lock();

        let sequence = match *state {
            Some((day, last)) if day == today => last + 1,
            _ => 1,
        };
        *state = Some((today, sequence));

        format!("{}{sequence:03}", Self::prefix(now))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(NaiveDate, u32)>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
