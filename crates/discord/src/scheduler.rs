//! Poll expiry scheduling.
//!
//! Closing on expiry is a fire-and-check design: the timer always
//! fires, and a poll that was closed manually in the meantime makes the
//! callback a no-op. Nothing ever cancels a scheduled expiry.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use guildhall_core::domain::poll::PollId;

#[async_trait]
pub trait ExpiryScheduler: Send + Sync {
    /// Arranges for the poll to be closed at `deadline`. Firing after a
    /// manual close must be harmless.
    async fn schedule_close(&self, poll_id: PollId, deadline: DateTime<Utc>);
}

/// Captures scheduled deadlines without running any timers.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub scheduled: Mutex<Vec<(PollId, DateTime<Utc>)>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(PollId, DateTime<Utc>)> {
        match self.scheduled.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ExpiryScheduler for RecordingScheduler {
    async fn schedule_close(&self, poll_id: PollId, deadline: DateTime<Utc>) {
        match self.scheduled.lock() {
            Ok(mut guard) => guard.push((poll_id, deadline)),
            Err(poisoned) => poisoned.into_inner().push((poll_id, deadline)),
        }
    }
}
