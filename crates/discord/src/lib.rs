//! Discord interface for guildhall.
//!
//! This crate adapts gateway traffic to the core engines:
//! - **Events** (`events`) - message, reaction, and slash-command dispatch
//! - **Commands** (`commands`) - `/poll`, `/rank`, `/leaderboard` parsing and routing
//! - **Embeds** (`embeds`) - typed outbound message bodies
//! - **Gateway** (`gateway`) - the outbound chat surface the bot renders through
//! - **Scheduler** (`scheduler`) - fire-and-check poll expiry
//!
//! # Architecture
//!
//! ```text
//! Gateway Events → EventDispatcher → Handlers → Engines (core) → Repositories (db)
//!                        ↓
//!                  Embeds ← ChatGateway
//! ```

pub mod commands;
pub mod embeds;
pub mod events;
pub mod gateway;
pub mod scheduler;
pub mod service;

pub use commands::{
    parse_command, BotCommand, BotCommandService, CommandParseError, CommandRouteError,
    CommandRouter, SlashCommandPayload,
};
pub use embeds::{Embed, EmbedBuilder, EmbedField, MessageBody};
pub use events::{
    EventContext, EventDispatcher, EventHandler, GatewayEnvelope, GatewayEvent, GatewayEventType,
    HandlerResult, MessagePostedEvent, MessageXpHandler, ReactionAddedEvent, ReactionVoteHandler,
    SlashCommandHandler,
};
pub use gateway::{ChatGateway, GatewayCall, GatewayError, NoopGateway, RecordingGateway};
pub use scheduler::{ExpiryScheduler, RecordingScheduler};
pub use service::EngineCommandService;
