//! In-memory repositories with the same observable behavior as the
//! sqlite-backed ones. Used by downstream crates in tests and by the
//! doctor command when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use guildhall_core::domain::poll::{MessageRef, Poll, PollId, PollVote};
use guildhall_core::domain::profile::{GuildId, UserId, UserProfile};
use guildhall_core::repository::{PollRepository, ProfileRepository, RepositoryError};

#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    rows: RwLock<HashMap<(UserId, GuildId), UserProfile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let key = (user_id.clone(), guild_id.clone());
        Ok(self.rows.read().await.get(&key).cloned())
    }

    async fn upsert(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let key = (profile.user_id.clone(), profile.guild_id.clone());
        self.rows.write().await.insert(key, profile);
        Ok(())
    }

    async fn top(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<UserProfile>, RepositoryError> {
        let rows = self.rows.read().await;
        let mut profiles: Vec<UserProfile> =
            rows.values().filter(|profile| &profile.guild_id == guild_id).cloned().collect();
        profiles
            .sort_by(|a, b| b.level.cmp(&a.level).then_with(|| b.experience.cmp(&a.experience)));
        profiles.truncate(limit as usize);
        Ok(profiles)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPollRepository {
    polls: RwLock<Vec<Poll>>,
    votes: RwLock<Vec<PollVote>>,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn create_poll(&self, poll: Poll) -> Result<(), RepositoryError> {
        self.polls.write().await.push(poll);
        Ok(())
    }

    async fn poll_by_id(&self, id: &PollId) -> Result<Option<Poll>, RepositoryError> {
        Ok(self.polls.read().await.iter().find(|poll| &poll.id == id).cloned())
    }

    async fn poll_by_message_ref(
        &self,
        message_ref: &MessageRef,
    ) -> Result<Option<Poll>, RepositoryError> {
        Ok(self
            .polls
            .read()
            .await
            .iter()
            .find(|poll| poll.message_ref.as_ref() == Some(message_ref))
            .cloned())
    }

    async fn attach_message_ref(
        &self,
        id: &PollId,
        message_ref: &MessageRef,
    ) -> Result<(), RepositoryError> {
        let mut polls = self.polls.write().await;
        match polls.iter_mut().find(|poll| &poll.id == id) {
            Some(poll) => {
                poll.message_ref = Some(message_ref.clone());
                Ok(())
            }
            None => Err(RepositoryError::backend(format!("poll {id} not found"))),
        }
    }

    async fn set_inactive(&self, id: &PollId) -> Result<(), RepositoryError> {
        let mut polls = self.polls.write().await;
        match polls.iter_mut().find(|poll| &poll.id == id) {
            Some(poll) => {
                poll.active = false;
                Ok(())
            }
            None => Err(RepositoryError::backend(format!("poll {id} not found"))),
        }
    }

    async fn create_or_overwrite_vote(&self, vote: PollVote) -> Result<(), RepositoryError> {
        let mut votes = self.votes.write().await;
        match votes
            .iter_mut()
            .find(|row| row.poll_id == vote.poll_id && row.voter_id == vote.voter_id)
        {
            Some(row) => row.option_index = vote.option_index,
            None => votes.push(vote),
        }
        Ok(())
    }

    async fn append_vote(&self, vote: PollVote) -> Result<(), RepositoryError> {
        self.votes.write().await.push(vote);
        Ok(())
    }

    async fn votes_for_poll(&self, id: &PollId) -> Result<Vec<PollVote>, RepositoryError> {
        Ok(self.votes.read().await.iter().filter(|vote| &vote.poll_id == id).cloned().collect())
    }

    async fn delete_poll_with_votes(&self, id: &PollId) -> Result<(), RepositoryError> {
        self.votes.write().await.retain(|vote| &vote.poll_id != id);
        self.polls.write().await.retain(|poll| &poll.id != id);
        Ok(())
    }

    async fn recent_polls(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        let mut matching: Vec<Poll> =
            polls.iter().filter(|poll| &poll.guild_id == guild_id).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn active_polls(&self, guild_id: &GuildId) -> Result<Vec<Poll>, RepositoryError> {
        let polls = self.polls.read().await;
        let mut matching: Vec<Poll> = polls
            .iter()
            .filter(|poll| &poll.guild_id == guild_id && poll.active)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn count_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        Ok(self.polls.read().await.iter().filter(|poll| &poll.guild_id == guild_id).count()
            as u64)
    }

    async fn count_active_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        Ok(self
            .polls
            .read()
            .await
            .iter()
            .filter(|poll| &poll.guild_id == guild_id && poll.active)
            .count() as u64)
    }

    async fn count_votes(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        let polls = self.polls.read().await;
        let votes = self.votes.read().await;
        let count = votes
            .iter()
            .filter(|vote| {
                polls.iter().any(|poll| poll.id == vote.poll_id && &poll.guild_id == guild_id)
            })
            .count();
        Ok(count as u64)
    }
}
