use async_trait::async_trait;
use thiserror::Error;

use crate::domain::poll::{MessageRef, Poll, PollId, PollVote};
use crate::domain::profile::{GuildId, UserId, UserProfile};

/// Storage-agnostic repository failure. Concrete backends (sqlx in
/// `guildhall-db`) map their native errors into these variants at the
/// boundary so the engines never see a driver type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
    ) -> Result<Option<UserProfile>, RepositoryError>;

    /// Insert or replace the profile for its (user, guild) key. Must be
    /// atomic per record; experience and level always land together.
    async fn upsert(&self, profile: UserProfile) -> Result<(), RepositoryError>;

    /// Profiles for a guild ordered by level descending, ties broken by
    /// experience descending.
    async fn top(&self, guild_id: &GuildId, limit: u32)
        -> Result<Vec<UserProfile>, RepositoryError>;
}

#[async_trait]
pub trait PollRepository: Send + Sync {
    async fn create_poll(&self, poll: Poll) -> Result<(), RepositoryError>;

    async fn poll_by_id(&self, id: &PollId) -> Result<Option<Poll>, RepositoryError>;

    /// Explicit foreign-key lookup from a rendered view back to its poll.
    async fn poll_by_message_ref(
        &self,
        message_ref: &MessageRef,
    ) -> Result<Option<Poll>, RepositoryError>;

    async fn attach_message_ref(
        &self,
        id: &PollId,
        message_ref: &MessageRef,
    ) -> Result<(), RepositoryError>;

    async fn set_inactive(&self, id: &PollId) -> Result<(), RepositoryError>;

    /// One row per (poll, voter): update the option index in place when a
    /// row exists, insert otherwise. Used for Single/Anonymous polls.
    async fn create_or_overwrite_vote(&self, vote: PollVote) -> Result<(), RepositoryError>;

    /// Always inserts a new row. Used for Multiple polls.
    async fn append_vote(&self, vote: PollVote) -> Result<(), RepositoryError>;

    async fn votes_for_poll(&self, id: &PollId) -> Result<Vec<PollVote>, RepositoryError>;

    /// Removes the poll and all of its votes as one unit. Backends that
    /// cannot guarantee multi-record atomicity must delete votes first.
    async fn delete_poll_with_votes(&self, id: &PollId) -> Result<(), RepositoryError>;

    /// Most recently created polls for a guild, newest first.
    async fn recent_polls(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<Poll>, RepositoryError>;

    /// Active polls for a guild, newest first.
    async fn active_polls(&self, guild_id: &GuildId) -> Result<Vec<Poll>, RepositoryError>;

    async fn count_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError>;

    async fn count_active_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError>;

    async fn count_votes(&self, guild_id: &GuildId) -> Result<u64, RepositoryError>;
}
