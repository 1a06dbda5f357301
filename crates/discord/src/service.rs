//! Command service wiring the engines to the outbound gateway.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use guildhall_core::domain::poll::{Poll, PollId, PollType};
use guildhall_core::domain::profile::{ChannelId, GuildId, UserId};
use guildhall_core::errors::PollError;
use guildhall_core::leveling::LevelingEngine;
use guildhall_core::polls::{CreatePollRequest, PollEngine, TallyRow};
use guildhall_core::view::PollResultView;

use crate::commands::{BotCommandService, CommandRouteError, SlashCommandPayload};
use crate::embeds::{self, MessageBody};
use crate::gateway::{ChatGateway, GatewayError};
use crate::scheduler::ExpiryScheduler;

pub struct EngineCommandService {
    leveling: Arc<LevelingEngine>,
    polls: Arc<PollEngine>,
    gateway: Arc<dyn ChatGateway>,
    scheduler: Arc<dyn ExpiryScheduler>,
    admin_user_ids: Vec<String>,
}

impl EngineCommandService {
    pub fn new(
        leveling: Arc<LevelingEngine>,
        polls: Arc<PollEngine>,
        gateway: Arc<dyn ChatGateway>,
        scheduler: Arc<dyn ExpiryScheduler>,
        admin_user_ids: Vec<String>,
    ) -> Self {
        Self { leveling, polls, gateway, scheduler, admin_user_ids }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|admin| admin == user_id)
    }

    fn render(&self, poll: &Poll, tally: &[TallyRow]) -> MessageBody {
        let symbols = self.polls.symbols_for_options(poll.options.len());
        embeds::poll_embed(&PollResultView::build(poll, tally, symbols))
    }

    /// Rebuilds the result view from current state and pushes it to the
    /// rendered message, when one is attached.
    pub async fn refresh_poll_view(&self, poll_id: &PollId) -> Result<(), PollError> {
        let poll = self.polls.poll(poll_id).await?;
        let Some(message_ref) = poll.message_ref.clone() else {
            return Ok(());
        };

        let tally = self.polls.tally(poll_id).await?;
        let body = self.render(&poll, &tally);
        if let Err(error) = self.gateway.update_message(&message_ref, &body).await {
            tracing::warn!(poll_id = %poll_id, %error, "result view update failed");
        }
        Ok(())
    }
}

/// User denials become friendly replies; storage failures bubble up so
/// the caller can report that nothing happened.
fn reply_or_fail(error: PollError) -> Result<MessageBody, CommandRouteError> {
    if error.is_user_denial() {
        Ok(embeds::error_message(&error.to_string()))
    } else {
        Err(CommandRouteError::Service(error.to_string()))
    }
}

fn gateway_failure(error: GatewayError) -> CommandRouteError {
    CommandRouteError::Service(error.to_string())
}

#[async_trait]
impl BotCommandService for EngineCommandService {
    async fn create_poll(
        &self,
        question: String,
        options: Vec<String>,
        poll_type: PollType,
        duration_hours: Option<u32>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        let request = CreatePollRequest {
            guild_id: GuildId(payload.guild_id.clone()),
            channel_id: ChannelId(payload.channel_id.clone()),
            author_id: UserId(payload.user_id.clone()),
            question,
            options,
            poll_type,
            duration_hours,
        };

        let poll = match self.polls.create_poll(request, Utc::now()).await {
            Ok(poll) => poll,
            Err(error) => return reply_or_fail(error),
        };

        let tally = self.polls.tally(&poll.id).await.map_err(|error| {
            CommandRouteError::Service(error.to_string())
        })?;
        let body = self.render(&poll, &tally);
        let message_ref = self
            .gateway
            .create_message(&poll.channel_id, &body)
            .await
            .map_err(gateway_failure)?;

        if let Err(error) = self.polls.attach_message_ref(&poll.id, &message_ref).await {
            return reply_or_fail(error);
        }

        for symbol in self.polls.symbols_for_options(poll.options.len()) {
            self.gateway.add_reaction(&message_ref, symbol).await.map_err(gateway_failure)?;
        }

        if let Some(deadline) = poll.expires_at() {
            self.scheduler.schedule_close(poll.id.clone(), deadline).await;
        }

        info!(poll_id = %poll.id, guild = %payload.guild_id, "poll created");
        Ok(MessageBody::text(format!("Poll `{}` is live. Vote with the reactions below!", poll.id)))
    }

    async fn close_poll(
        &self,
        poll_id: PollId,
        _payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        match self.polls.close_poll(&poll_id).await {
            Ok(Some(_)) => {
                if let Err(error) = self.refresh_poll_view(&poll_id).await {
                    return reply_or_fail(error);
                }
                info!(poll_id = %poll_id, "poll closed");
                Ok(MessageBody::text(format!("Poll `{poll_id}` closed.")))
            }
            Ok(None) => Ok(MessageBody::text(format!("Poll `{poll_id}` was already closed."))),
            Err(error) => reply_or_fail(error),
        }
    }

    async fn poll_results(
        &self,
        poll_id: Option<PollId>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        let Some(poll_id) = poll_id else {
            return match self.polls.active_polls(&GuildId(payload.guild_id.clone())).await {
                Ok(active) => Ok(embeds::active_polls_embed(&active)),
                Err(error) => reply_or_fail(error),
            };
        };

        let poll = match self.polls.poll(&poll_id).await {
            Ok(poll) => poll,
            Err(error) => return reply_or_fail(error),
        };
        match self.polls.tally(&poll_id).await {
            Ok(tally) => Ok(self.render(&poll, &tally)),
            Err(error) => reply_or_fail(error),
        }
    }

    async fn delete_poll(
        &self,
        poll_id: PollId,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        let requester = UserId(payload.user_id.clone());
        match self.polls.delete_poll(&poll_id, &requester, self.is_admin(&payload.user_id)).await
        {
            Ok(()) => {
                info!(poll_id = %poll_id, requester = %payload.user_id, "poll deleted");
                Ok(MessageBody::text(format!("Poll `{poll_id}` and its votes were deleted.")))
            }
            Err(error) => reply_or_fail(error),
        }
    }

    async fn poll_stats(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        match self.polls.poll_stats(&GuildId(payload.guild_id.clone())).await {
            Ok(stats) => Ok(embeds::poll_stats_embed(&stats)),
            Err(error) => reply_or_fail(error),
        }
    }

    async fn rank(
        &self,
        target_user_id: Option<String>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        let user_id = UserId(target_user_id.unwrap_or_else(|| payload.user_id.clone()));
        let summary =
            self.leveling.get_user_level(&user_id, &GuildId(payload.guild_id.clone())).await;
        Ok(embeds::rank_embed(&format!("<@{}>", user_id.0), &summary))
    }

    async fn leaderboard(
        &self,
        limit: Option<u32>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        let board = self
            .leveling
            .top_users(&GuildId(payload.guild_id.clone()), limit.unwrap_or(10))
            .await;
        Ok(embeds::leaderboard_embed(&board))
    }
}
