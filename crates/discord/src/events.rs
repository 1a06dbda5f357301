//! Inbound event dispatch.
//!
//! Every gateway event is handled as one bounded task: look up state,
//! apply an engine operation, push the outcome back through the
//! gateway. Failures are scoped to the single event being handled.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use guildhall_core::domain::poll::MessageRef;
use guildhall_core::domain::profile::{ChannelId, GuildId, UserId};
use guildhall_core::leveling::LevelingEngine;
use guildhall_core::polls::PollEngine;
use guildhall_core::view::PollResultView;

use crate::commands::{
    parse_command, BotCommandService, CommandRouteError, CommandRouter, SlashCommandPayload,
};
use crate::embeds::{self, MessageBody};
use crate::gateway::ChatGateway;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub event_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    MessagePosted(MessagePostedEvent),
    ReactionAdded(ReactionAddedEvent),
    SlashCommand(SlashCommandPayload),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::MessagePosted(_) => GatewayEventType::MessagePosted,
            Self::ReactionAdded(_) => GatewayEventType::ReactionAdded,
            Self::SlashCommand(_) => GatewayEventType::SlashCommand,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    MessagePosted,
    ReactionAdded,
    SlashCommand,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePostedEvent {
    pub guild_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub author_role_ids: Vec<String>,
    pub message_id: String,
    pub text_length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionAddedEvent {
    pub guild_id: String,
    pub reactor_id: String,
    pub reactor_is_bot: bool,
    pub message_id: String,
    pub symbol: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HandlerResult {
    Responded(MessageBody),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("engine operation failed: {0}")]
    Engine(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Grants XP for qualifying messages and announces level-ups.
pub struct MessageXpHandler {
    leveling: Arc<LevelingEngine>,
    gateway: Arc<dyn ChatGateway>,
}

impl MessageXpHandler {
    pub fn new(leveling: Arc<LevelingEngine>, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { leveling, gateway }
    }
}

#[async_trait]
impl EventHandler for MessageXpHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MessagePosted
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::MessagePosted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.author_is_bot {
            return Ok(HandlerResult::Ignored);
        }

        let channel_id = ChannelId(event.channel_id.clone());
        if !self.leveling.message_qualifies(&channel_id, event.text_length) {
            return Ok(HandlerResult::Ignored);
        }

        let grant = self
            .leveling
            .grant_xp_for_message(
                &UserId(event.author_id.clone()),
                &GuildId(event.guild_id.clone()),
                &event.author_role_ids,
                Utc::now(),
            )
            .await;

        if let Some(grant) = grant {
            if grant.leveled_up {
                let announcement = self
                    .leveling
                    .level_up_message(&format!("<@{}>", event.author_id), grant.new_level);
                // Announcements are best effort; a failed send must not
                // fail the message event.
                if let Err(error) = self.gateway.send_text(&channel_id, &announcement).await {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        user = %event.author_id,
                        %error,
                        "level-up announcement failed"
                    );
                }
            }
        }

        Ok(HandlerResult::Processed)
    }
}

/// Turns option-symbol reactions on poll messages into ballots and
/// refreshes the rendered result view.
pub struct ReactionVoteHandler {
    polls: Arc<PollEngine>,
    gateway: Arc<dyn ChatGateway>,
}

impl ReactionVoteHandler {
    pub fn new(polls: Arc<PollEngine>, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { polls, gateway }
    }
}

#[async_trait]
impl EventHandler for ReactionVoteHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.reactor_is_bot {
            return Ok(HandlerResult::Ignored);
        }

        let Some(option_index) = self.polls.option_index_for_symbol(&event.symbol) else {
            return Ok(HandlerResult::Ignored);
        };

        let message_ref = MessageRef(event.message_id.clone());
        let poll = self
            .polls
            .poll_by_message_ref(&message_ref)
            .await
            .map_err(|error| EventHandlerError::Engine(error.to_string()))?;
        let Some(poll) = poll else {
            return Ok(HandlerResult::Ignored);
        };

        let voter = UserId(event.reactor_id.clone());
        match self.polls.cast_vote(&poll.id, &voter, option_index).await {
            Ok(()) => {}
            // Stray reactions on closed polls are expected traffic.
            Err(error) if error.is_user_denial() => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    poll_id = %poll.id,
                    voter = %event.reactor_id,
                    %error,
                    "ballot rejected"
                );
                return Ok(HandlerResult::Processed);
            }
            Err(error) => return Err(EventHandlerError::Engine(error.to_string())),
        }

        let tally = self
            .polls
            .tally(&poll.id)
            .await
            .map_err(|error| EventHandlerError::Engine(error.to_string()))?;
        let symbols = self.polls.symbols_for_options(poll.options.len());
        let body = embeds::poll_embed(&PollResultView::build(&poll, &tally, symbols));
        if let Err(error) = self.gateway.update_message(&message_ref, &body).await {
            warn!(
                correlation_id = %ctx.correlation_id,
                poll_id = %poll.id,
                %error,
                "result view update failed"
            );
        }

        Ok(HandlerResult::Processed)
    }
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: BotCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: BotCommandService + 'static,
{
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = match parse_command(payload) {
            Ok(command) => command,
            Err(error) => {
                return Ok(HandlerResult::Responded(embeds::error_message(&error.to_string())))
            }
        };

        let body = self.router.route(command, payload).await?;
        Ok(HandlerResult::Responded(body))
    }
}
