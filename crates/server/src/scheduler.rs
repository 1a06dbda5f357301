//! Tokio-backed poll expiry.
//!
//! One detached task per bounded poll. The task always fires; when the
//! poll was closed manually first, the close is a no-op and the timer
//! simply logs and exits. Nothing is cancelled on manual close.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use guildhall_core::domain::poll::PollId;
use guildhall_core::polls::PollEngine;
use guildhall_core::view::PollResultView;
use guildhall_discord::embeds;
use guildhall_discord::gateway::ChatGateway;
use guildhall_discord::scheduler::ExpiryScheduler;

pub struct TokioExpiryScheduler {
    polls: Arc<PollEngine>,
    gateway: Arc<dyn ChatGateway>,
}

impl TokioExpiryScheduler {
    pub fn new(polls: Arc<PollEngine>, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { polls, gateway }
    }
}

#[async_trait]
impl ExpiryScheduler for TokioExpiryScheduler {
    async fn schedule_close(&self, poll_id: PollId, deadline: DateTime<Utc>) {
        let polls = self.polls.clone();
        let gateway = self.gateway.clone();

        tokio::spawn(async move {
            let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            expire(&polls, gateway.as_ref(), &poll_id).await;
        });
    }
}

async fn expire(polls: &PollEngine, gateway: &dyn ChatGateway, poll_id: &PollId) {
    match polls.close_poll(poll_id).await {
        Ok(Some(tally)) => {
            debug!(poll_id = %poll_id, "poll expired");
            let poll = match polls.poll(poll_id).await {
                Ok(poll) => poll,
                Err(error) => {
                    warn!(poll_id = %poll_id, %error, "expired poll vanished before rendering");
                    return;
                }
            };
            let Some(message_ref) = poll.message_ref.clone() else {
                return;
            };
            let symbols = polls.symbols_for_options(poll.options.len());
            let body = embeds::poll_embed(&PollResultView::build(&poll, &tally, symbols));
            if let Err(error) = gateway.update_message(&message_ref, &body).await {
                warn!(poll_id = %poll_id, %error, "closed view update failed");
            }
        }
        Ok(None) => {
            debug!(poll_id = %poll_id, "expiry fired after manual close, nothing to do");
        }
        Err(error) => {
            warn!(poll_id = %poll_id, %error, "expiry close failed");
        }
    }
}
