//! In-memory repository doubles for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::poll::{MessageRef, Poll, PollId, PollVote};
use crate::domain::profile::{GuildId, UserId, UserProfile};
use crate::repository::{PollRepository, ProfileRepository, RepositoryError};

#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    rows: RwLock<HashMap<(UserId, GuildId), UserProfile>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, profile: UserProfile) {
        let key = (profile.user_id.clone(), profile.guild_id.clone());
        self.rows.write().await.insert(key, profile);
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::backend(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        self.check(&self.fail_reads, "read")?;
        let key = (user_id.clone(), guild_id.clone());
        Ok(self.rows.read().await.get(&key).cloned())
    }

    async fn upsert(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        self.check(&self.fail_writes, "write")?;
        let key = (profile.user_id.clone(), profile.guild_id.clone());
        self.rows.write().await.insert(key, profile);
        Ok(())
    }

    async fn top(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<UserProfile>, RepositoryError> {
        self.check(&self.fail_reads, "read")?;
        let rows = self.rows.read().await;
        let mut profiles: Vec<UserProfile> =
            rows.values().filter(|profile| &profile.guild_id == guild_id).cloned().collect();
        profiles.sort_by(|a, b| {
            b.level.cmp(&a.level).then_with(|| b.experience.cmp(&a.experience))
        });
        profiles.truncate(limit as usize);
        Ok(profiles)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPollRepository {
    polls: RwLock<Vec<Poll>>,
    votes: RwLock<Vec<PollVote>>,
    pub fail_writes: AtomicBool,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writes(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::backend("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn create_poll(&self, poll: Poll) -> Result<(), RepositoryError> {
        self.check_writes()?;
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
        self.check_writes()?;
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
        self.check_writes()?;
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
        self.check_writes()?;
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
        self.check_writes()?;
        self.votes.write().await.push(vote);
        Ok(())
    }

    async fn votes_for_poll(&self, id: &PollId) -> Result<Vec<PollVote>, RepositoryError> {
        Ok(self.votes.read().await.iter().filter(|vote| &vote.poll_id == id).cloned().collect())
    }

    async fn delete_poll_with_votes(&self, id: &PollId) -> Result<(), RepositoryError> {
        self.check_writes()?;
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
        Ok(self.polls.read().await.iter().filter(|poll| &poll.guild_id == guild_id).count() as u64)
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
