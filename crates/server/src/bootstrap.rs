use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use guildhall_core::config::{AppConfig, ConfigError, LoadOptions};
use guildhall_core::leveling::LevelingEngine;
use guildhall_core::polls::PollEngine;
use guildhall_db::{connect, migrations, DbPool, SqlPollRepository, SqlProfileRepository};
use guildhall_discord::events::{
    EventDispatcher, MessageXpHandler, ReactionVoteHandler, SlashCommandHandler,
};
use guildhall_discord::gateway::{ChatGateway, NoopGateway};
use guildhall_discord::service::EngineCommandService;

use crate::scheduler::TokioExpiryScheduler;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: EventDispatcher,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let leveling = Arc::new(LevelingEngine::new(
        Arc::new(SqlProfileRepository::new(db_pool.clone())),
        config.leveling.clone(),
    ));
    let polls = Arc::new(PollEngine::new(
        Arc::new(SqlPollRepository::new(db_pool.clone())),
        config.polls.clone(),
    ));

    // No connected transport yet; outbound calls are logged until a bot
    // connection is wired in.
    let gateway: Arc<dyn ChatGateway> = Arc::new(NoopGateway::new());
    let scheduler = Arc::new(TokioExpiryScheduler::new(polls.clone(), gateway.clone()));

    let service = EngineCommandService::new(
        leveling.clone(),
        polls.clone(),
        gateway.clone(),
        scheduler,
        config.discord.admin_user_ids.clone(),
    );

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageXpHandler::new(leveling, gateway.clone()));
    dispatcher.register(ReactionVoteHandler::new(polls, gateway));
    dispatcher.register(SlashCommandHandler::new(service));
    info!(handlers = dispatcher.handler_count(), "event dispatcher assembled");

    Ok(Application { config, db_pool, dispatcher })
}
