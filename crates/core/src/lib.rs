pub mod config;
pub mod cooldown;
pub mod domain;
pub mod errors;
pub mod leveling;
pub mod polls;
pub mod repository;
pub mod view;

#[cfg(test)]
mod test_support;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, DiscordConfig, LevelingConfig,
    LoadOptions, LogFormat, LoggingConfig, PollsConfig, ServerConfig,
};
pub use cooldown::CooldownTracker;
pub use domain::poll::{MessageRef, Poll, PollId, PollType, PollVote};
pub use domain::profile::{ChannelId, GuildId, UserId, UserProfile};
pub use errors::PollError;
pub use leveling::{
    calculate_level, cumulative_xp_to_reach, required_xp, LevelSummary, LevelingEngine, XpGrant,
};
pub use polls::{CreatePollRequest, PollEngine, PollStats, PollWithVoteCount, TallyRow};
pub use repository::{PollRepository, ProfileRepository, RepositoryError};
pub use view::{PollResultRow, PollResultView};
