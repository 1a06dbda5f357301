use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Process-local, best-effort throttle keyed by an arbitrary string.
///
/// State lives only in memory and is lost on restart; it gates bonus XP,
/// not correctness, so a lost race or a restart merely allows one extra
/// grant inside the window. The clock is injected by the caller so the
/// tracker itself never reads wall time.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_consumed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `now` when the key is outside its window;
    /// returns false and leaves the recorded timestamp untouched otherwise.
    pub fn try_consume(&self, key: &str, window: Duration, now: DateTime<Utc>) -> bool {
        let mut last_consumed = match self.last_consumed.lock() {
            Ok(guard) => guard,
            // A poisoned throttle map should never block grants.
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(last) = last_consumed.get(key) {
            if now - *last < window {
                return false;
            }
        }

        last_consumed.insert(key.to_string(), now);
        true
    }
}
