//! Poll lifecycle: create, vote, tally, close, delete.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::PollsConfig;
use crate::domain::poll::{MessageRef, Poll, PollId, PollType, PollVote};
use crate::domain::profile::{ChannelId, GuildId, UserId};
use crate::errors::PollError;
use crate::repository::PollRepository;

#[derive(Clone, Debug)]
pub struct CreatePollRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub question: String,
    pub options: Vec<String>,
    pub poll_type: PollType,
    /// Falls back to the configured default when absent; zero keeps the
    /// poll open until closed manually.
    pub duration_hours: Option<u32>,
}

/// One tally line per option, always in option-declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct TallyRow {
    pub option: String,
    pub vote_count: u64,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PollWithVoteCount {
    pub poll: Poll,
    pub vote_count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PollStats {
    pub total_polls: u64,
    pub active_polls: u64,
    pub total_votes: u64,
    /// The five most recently created polls, newest first.
    pub recent: Vec<PollWithVoteCount>,
}

pub struct PollEngine {
    polls: Arc<dyn PollRepository>,
    config: PollsConfig,
}

impl PollEngine {
    pub fn new(polls: Arc<dyn PollRepository>, config: PollsConfig) -> Self {
        Self { polls, config }
    }

    /// Maps a reaction symbol back to the option index it stands for.
    pub fn option_index_for_symbol(&self, symbol: &str) -> Option<usize> {
        self.config.reaction_symbols.iter().position(|known| known == symbol)
    }

    /// Reaction symbols for the first `option_count` options, in order.
    pub fn symbols_for_options(&self, option_count: usize) -> &[String] {
        let end = option_count.min(self.config.reaction_symbols.len());
        &self.config.reaction_symbols[..end]
    }

    /// Validates and persists a new poll. The returned poll has no
    /// message reference yet: the caller renders the initial view, then
    /// completes creation with [`PollEngine::attach_message_ref`].
    pub async fn create_poll(
        &self,
        request: CreatePollRequest,
        now: DateTime<Utc>,
    ) -> Result<Poll, PollError> {
        let option_count = request.options.len();
        if option_count < self.config.min_options || option_count > self.config.max_options {
            return Err(PollError::InvalidOptionCount {
                given: option_count,
                min: self.config.min_options,
                max: self.config.max_options,
            });
        }

        let poll = Poll {
            id: PollId::generate(),
            guild_id: request.guild_id,
            channel_id: request.channel_id,
            author_id: request.author_id,
            question: request.question,
            options: request.options,
            poll_type: request.poll_type,
            duration_hours: request.duration_hours.unwrap_or(self.config.default_duration_hours),
            active: true,
            created_at: now,
            message_ref: None,
        };

        self.polls.create_poll(poll.clone()).await?;
        Ok(poll)
    }

    /// Second half of the creation handshake: links the rendered view
    /// back to the poll record so reaction events can find it.
    pub async fn attach_message_ref(
        &self,
        id: &PollId,
        message_ref: &MessageRef,
    ) -> Result<(), PollError> {
        self.polls.attach_message_ref(id, message_ref).await?;
        Ok(())
    }

    pub async fn poll(&self, id: &PollId) -> Result<Poll, PollError> {
        self.polls.poll_by_id(id).await?.ok_or_else(|| PollError::NotFound(id.clone()))
    }

    /// Explicit lookup from a rendered view's handle to its poll; the
    /// handle acts as a foreign key, never inferred from view content.
    pub async fn poll_by_message_ref(
        &self,
        message_ref: &MessageRef,
    ) -> Result<Option<Poll>, PollError> {
        Ok(self.polls.poll_by_message_ref(message_ref).await?)
    }

    /// Records one ballot. Single and anonymous polls keep one row per
    /// voter and treat a repeat vote as a change of choice; multiple
    /// polls append every ballot as-is.
    pub async fn cast_vote(
        &self,
        poll_id: &PollId,
        voter_id: &UserId,
        option_index: usize,
    ) -> Result<(), PollError> {
        let poll = self.poll(poll_id).await?;
        if !poll.active {
            return Err(PollError::Closed(poll.id));
        }
        if option_index >= poll.options.len() {
            return Err(PollError::InvalidOption { index: option_index, option_count: poll.options.len() });
        }

        let vote =
            PollVote { poll_id: poll.id.clone(), voter_id: voter_id.clone(), option_index };
        if poll.poll_type.overwrites_repeat_votes() {
            self.polls.create_or_overwrite_vote(vote).await?;
        } else {
            self.polls.append_vote(vote).await?;
        }
        Ok(())
    }

    /// Recomputes counts and percentages from the current vote set.
    /// Never cached; rows come back in option-declaration order.
    pub async fn tally(&self, poll_id: &PollId) -> Result<Vec<TallyRow>, PollError> {
        let poll = self.poll(poll_id).await?;
        let votes = self.polls.votes_for_poll(poll_id).await?;
        Ok(tally_votes(&poll, &votes))
    }

    /// Closes the poll and returns the final tally for rendering, or
    /// `None` if it was already closed. Safe to call from both the
    /// manual command and a late expiry timer; votes are never deleted.
    pub async fn close_poll(&self, poll_id: &PollId) -> Result<Option<Vec<TallyRow>>, PollError> {
        let poll = self.poll(poll_id).await?;
        if !poll.active {
            return Ok(None);
        }

        self.polls.set_inactive(poll_id).await?;
        let votes = self.polls.votes_for_poll(poll_id).await?;
        Ok(Some(tally_votes(&poll, &votes)))
    }

    /// Removes a poll and its votes as one unit. Only the author or an
    /// admin may delete; votes go first so a crash mid-delete leaves a
    /// harmless empty poll rather than orphaned votes.
    pub async fn delete_poll(
        &self,
        poll_id: &PollId,
        requester_id: &UserId,
        is_admin: bool,
    ) -> Result<(), PollError> {
        let poll = self.poll(poll_id).await?;
        if &poll.author_id != requester_id && !is_admin {
            return Err(PollError::NotAuthorized);
        }

        self.polls.delete_poll_with_votes(poll_id).await?;
        Ok(())
    }

    pub async fn active_polls(&self, guild_id: &GuildId) -> Result<Vec<Poll>, PollError> {
        Ok(self.polls.active_polls(guild_id).await?)
    }

    /// Reporting read for the stats command; not part of the vote path.
    pub async fn poll_stats(&self, guild_id: &GuildId) -> Result<PollStats, PollError> {
        let total_polls = self.polls.count_polls(guild_id).await?;
        let active_polls = self.polls.count_active_polls(guild_id).await?;
        let total_votes = self.polls.count_votes(guild_id).await?;

        let mut recent = Vec::new();
        for poll in self.polls.recent_polls(guild_id, 5).await? {
            let vote_count = self.polls.votes_for_poll(&poll.id).await?.len() as u64;
            recent.push(PollWithVoteCount { poll, vote_count });
        }

        Ok(PollStats { total_polls, active_polls, total_votes, recent })
    }
}

fn tally_votes(poll: &Poll, votes: &[PollVote]) -> Vec<TallyRow> {
    let mut counts = vec![0u64; poll.options.len()];
    for vote in votes {
        if let Some(slot) = counts.get_mut(vote.option_index) {
            *slot += 1;
        }
    }

    let total: u64 = counts.iter().sum();
    poll.options
        .iter()
        .zip(counts)
        .map(|(option, vote_count)| TallyRow {
            option: option.clone(),
            vote_count,
            percentage: if total > 0 { 100.0 * vote_count as f64 / total as f64 } else { 0.0 },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::{CreatePollRequest, PollEngine};
    use crate::config::AppConfig;
    use crate::domain::poll::{MessageRef, Poll, PollId, PollType};
    use crate::domain::profile::{ChannelId, GuildId, UserId};
    use crate::errors::PollError;
    use crate::repository::PollRepository;
    use crate::test_support::InMemoryPollRepository;

    fn now() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn engine() -> (PollEngine, Arc<InMemoryPollRepository>) {
        let repo = Arc::new(InMemoryPollRepository::new());
        (PollEngine::new(repo.clone(), AppConfig::default().polls), repo)
    }

    fn request(options: &[&str], poll_type: PollType) -> CreatePollRequest {
        CreatePollRequest {
            guild_id: GuildId("G1".to_string()),
            channel_id: ChannelId("C1".to_string()),
            author_id: UserId("author".to_string()),
            question: "Best letter?".to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
            poll_type,
            duration_hours: Some(0),
        }
    }

    async fn create(engine: &PollEngine, options: &[&str], poll_type: PollType) -> Poll {
        engine.create_poll(request(options, poll_type), now()).await.expect("create poll")
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_option_counts() {
        let (engine, _) = engine();

        let too_few = engine.create_poll(request(&["A"], PollType::Single), now()).await;
        assert!(matches!(
            too_few,
            Err(PollError::InvalidOptionCount { given: 1, min: 2, max: 10 })
        ));

        let eleven: Vec<&str> = vec!["x"; 11];
        let too_many = engine.create_poll(request(&eleven, PollType::Single), now()).await;
        assert!(matches!(too_many, Err(PollError::InvalidOptionCount { given: 11, .. })));
    }

    #[tokio::test]
    async fn create_applies_the_default_duration_when_none_is_given() {
        let (engine, _) = engine();
        let mut create_request = request(&["A", "B"], PollType::Single);
        create_request.duration_hours = None;

        let poll = engine.create_poll(create_request, now()).await.expect("create poll");
        assert_eq!(poll.duration_hours, 24);
        assert!(poll.active);
        assert!(poll.message_ref.is_none());
    }

    #[tokio::test]
    async fn message_ref_attachment_completes_the_creation_handshake() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;

        engine
            .attach_message_ref(&poll.id, &MessageRef("m-1".to_string()))
            .await
            .expect("attach ref");

        let found = engine
            .poll_by_message_ref(&MessageRef("m-1".to_string()))
            .await
            .expect("lookup")
            .expect("poll should be found by its message ref");
        assert_eq!(found.id, poll.id);
        assert_eq!(repo.poll_by_id(&poll.id).await.expect("read").expect("poll").message_ref, Some(MessageRef("m-1".to_string())));
    }

    #[tokio::test]
    async fn single_poll_repeat_vote_overwrites_the_previous_choice() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B", "C"], PollType::Single).await;
        let voter = UserId("voter".to_string());

        engine.cast_vote(&poll.id, &voter, 1).await.expect("first vote");
        engine.cast_vote(&poll.id, &voter, 2).await.expect("changed vote");

        let votes = repo.votes_for_poll(&poll.id).await.expect("votes");
        assert_eq!(votes.len(), 1, "single polls keep one record per voter");
        assert_eq!(votes[0].option_index, 2);

        let tally = engine.tally(&poll.id).await.expect("tally");
        assert_eq!(tally[0].vote_count, 0);
        assert_eq!(tally[1].vote_count, 0);
        assert_eq!(tally[2].vote_count, 1);
        assert_eq!(tally[0].percentage, 0.0);
        assert_eq!(tally[2].percentage, 100.0);
    }

    #[tokio::test]
    async fn multiple_poll_accumulates_repeat_votes() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Multiple).await;
        let voter = UserId("voter".to_string());

        engine.cast_vote(&poll.id, &voter, 0).await.expect("first vote");
        engine.cast_vote(&poll.id, &voter, 0).await.expect("second vote");

        assert_eq!(repo.votes_for_poll(&poll.id).await.expect("votes").len(), 2);
        let tally = engine.tally(&poll.id).await.expect("tally");
        assert_eq!(tally[0].vote_count, 2);
    }

    #[tokio::test]
    async fn anonymous_poll_shares_single_vote_storage() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Anonymous).await;
        let voter = UserId("voter".to_string());

        engine.cast_vote(&poll.id, &voter, 0).await.expect("first vote");
        engine.cast_vote(&poll.id, &voter, 1).await.expect("changed vote");

        assert_eq!(repo.votes_for_poll(&poll.id).await.expect("votes").len(), 1);
    }

    #[tokio::test]
    async fn voting_on_a_closed_poll_is_rejected_without_a_record() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;

        engine.close_poll(&poll.id).await.expect("close");
        let result = engine.cast_vote(&poll.id, &UserId("voter".to_string()), 0).await;
        assert!(matches!(result, Err(PollError::Closed(_))));
        assert!(repo.votes_for_poll(&poll.id).await.expect("votes").is_empty());
    }

    #[tokio::test]
    async fn out_of_range_option_index_is_rejected() {
        let (engine, _) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;

        let result = engine.cast_vote(&poll.id, &UserId("voter".to_string()), 2).await;
        assert!(matches!(result, Err(PollError::InvalidOption { index: 2, option_count: 2 })));
    }

    #[tokio::test]
    async fn voting_on_an_unknown_poll_fails_with_not_found() {
        let (engine, _) = engine();
        let result = engine
            .cast_vote(&PollId("missing".to_string()), &UserId("voter".to_string()), 0)
            .await;
        assert!(matches!(result, Err(PollError::NotFound(_))));
    }

    #[tokio::test]
    async fn tally_preserves_declaration_order_under_skewed_votes() {
        let (engine, _) = engine();
        let poll = create(&engine, &["A", "B", "C"], PollType::Multiple).await;

        for voter in ["v1", "v2", "v3"] {
            engine.cast_vote(&poll.id, &UserId(voter.to_string()), 2).await.expect("vote");
        }

        let tally = engine.tally(&poll.id).await.expect("tally");
        assert_eq!(tally[0].option, "A");
        assert_eq!(tally[0].vote_count, 0);
        assert_eq!(tally[2].option, "C");
        assert_eq!(tally[2].vote_count, 3);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_keeps_votes() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;
        engine.cast_vote(&poll.id, &UserId("voter".to_string()), 0).await.expect("vote");

        let first = engine.close_poll(&poll.id).await.expect("first close");
        let final_tally = first.expect("first close should return the final tally");
        assert_eq!(final_tally[0].vote_count, 1);

        let second = engine.close_poll(&poll.id).await.expect("second close");
        assert!(second.is_none(), "second close must be a no-op");

        let stored = repo.poll_by_id(&poll.id).await.expect("read").expect("poll");
        assert!(!stored.active);
        assert_eq!(stored.created_at, poll.created_at);
        assert_eq!(repo.votes_for_poll(&poll.id).await.expect("votes").len(), 1);
    }

    #[tokio::test]
    async fn delete_requires_author_or_admin() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;
        engine.cast_vote(&poll.id, &UserId("voter".to_string()), 0).await.expect("vote");

        let denied =
            engine.delete_poll(&poll.id, &UserId("stranger".to_string()), false).await;
        assert!(matches!(denied, Err(PollError::NotAuthorized)));
        assert!(repo.poll_by_id(&poll.id).await.expect("read").is_some());
        assert_eq!(repo.votes_for_poll(&poll.id).await.expect("votes").len(), 1);

        engine
            .delete_poll(&poll.id, &UserId("stranger".to_string()), true)
            .await
            .expect("admin delete");
        assert!(repo.poll_by_id(&poll.id).await.expect("read").is_none());
        assert!(repo.votes_for_poll(&poll.id).await.expect("votes").is_empty());
    }

    #[tokio::test]
    async fn author_may_delete_their_own_poll() {
        let (engine, repo) = engine();
        let poll = create(&engine, &["A", "B"], PollType::Single).await;

        engine.delete_poll(&poll.id, &UserId("author".to_string()), false).await.expect("delete");
        assert!(repo.poll_by_id(&poll.id).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn stats_aggregate_counts_and_recent_polls() {
        let (engine, _) = engine();
        let guild = GuildId("G1".to_string());

        let first = create(&engine, &["A", "B"], PollType::Single).await;
        let second = create(&engine, &["C", "D"], PollType::Multiple).await;
        engine.cast_vote(&first.id, &UserId("v1".to_string()), 0).await.expect("vote");
        engine.cast_vote(&second.id, &UserId("v1".to_string()), 1).await.expect("vote");
        engine.cast_vote(&second.id, &UserId("v2".to_string()), 1).await.expect("vote");
        engine.close_poll(&first.id).await.expect("close");

        let stats = engine.poll_stats(&guild).await.expect("stats");
        assert_eq!(stats.total_polls, 2);
        assert_eq!(stats.active_polls, 1);
        assert_eq!(stats.total_votes, 3);
        assert_eq!(stats.recent.len(), 2);
        let second_entry = stats
            .recent
            .iter()
            .find(|entry| entry.poll.id == second.id)
            .expect("recent should include the second poll");
        assert_eq!(second_entry.vote_count, 2);
    }

    #[test]
    fn reaction_symbols_map_to_option_indexes_in_order() {
        let (engine, _) = engine();
        assert_eq!(engine.option_index_for_symbol("🇦"), Some(0));
        assert_eq!(engine.option_index_for_symbol("🇨"), Some(2));
        assert_eq!(engine.option_index_for_symbol("❓"), None);
        assert_eq!(engine.symbols_for_options(3).len(), 3);
    }
}
