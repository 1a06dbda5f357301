use chrono::{DateTime, Utc};
use sqlx::Row;

use guildhall_core::domain::poll::{MessageRef, Poll, PollId, PollType, PollVote};
use guildhall_core::domain::profile::{ChannelId, GuildId, UserId};
use guildhall_core::repository::{PollRepository, RepositoryError};

use super::{backend_error, decode_error};
use crate::DbPool;

pub struct SqlPollRepository {
    pool: DbPool,
}

impl SqlPollRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POLL_COLUMNS: &str = "id, guild_id, channel_id, author_id, question, options,
                            poll_type, duration_hours, active, created_at, message_ref";

fn row_to_poll(row: &sqlx::sqlite::SqliteRow) -> Result<Poll, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let guild_id: String = row.try_get("guild_id").map_err(decode_error)?;
    let channel_id: String = row.try_get("channel_id").map_err(decode_error)?;
    let author_id: String = row.try_get("author_id").map_err(decode_error)?;
    let question: String = row.try_get("question").map_err(decode_error)?;
    let options_json: String = row.try_get("options").map_err(decode_error)?;
    let poll_type_str: String = row.try_get("poll_type").map_err(decode_error)?;
    let duration_hours: i64 = row.try_get("duration_hours").map_err(decode_error)?;
    let active: i64 = row.try_get("active").map_err(decode_error)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_error)?;
    let message_ref: Option<String> = row.try_get("message_ref").map_err(decode_error)?;

    let options: Vec<String> = serde_json::from_str(&options_json).map_err(decode_error)?;
    let poll_type = PollType::parse(&poll_type_str)
        .ok_or_else(|| decode_error(format!("unknown poll type `{poll_type_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(decode_error)?;

    Ok(Poll {
        id: PollId(id),
        guild_id: GuildId(guild_id),
        channel_id: ChannelId(channel_id),
        author_id: UserId(author_id),
        question,
        options,
        poll_type,
        duration_hours: u32::try_from(duration_hours).map_err(decode_error)?,
        active: active != 0,
        created_at,
        message_ref: message_ref.map(MessageRef),
    })
}

fn row_to_vote(row: &sqlx::sqlite::SqliteRow) -> Result<PollVote, RepositoryError> {
    let poll_id: String = row.try_get("poll_id").map_err(decode_error)?;
    let voter_id: String = row.try_get("voter_id").map_err(decode_error)?;
    let option_index: i64 = row.try_get("option_index").map_err(decode_error)?;

    Ok(PollVote {
        poll_id: PollId(poll_id),
        voter_id: UserId(voter_id),
        option_index: usize::try_from(option_index).map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl PollRepository for SqlPollRepository {
    async fn create_poll(&self, poll: Poll) -> Result<(), RepositoryError> {
        let options_json = serde_json::to_string(&poll.options).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO poll (id, guild_id, channel_id, author_id, question, options,
                               poll_type, duration_hours, active, created_at, message_ref)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&poll.id.0)
        .bind(&poll.guild_id.0)
        .bind(&poll.channel_id.0)
        .bind(&poll.author_id.0)
        .bind(&poll.question)
        .bind(&options_json)
        .bind(poll.poll_type.as_str())
        .bind(i64::from(poll.duration_hours))
        .bind(i64::from(poll.active))
        .bind(poll.created_at.to_rfc3339())
        .bind(poll.message_ref.as_ref().map(|message_ref| message_ref.0.clone()))
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn poll_by_id(&self, id: &PollId) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {POLL_COLUMNS} FROM poll WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        match row {
            Some(ref r) => Ok(Some(row_to_poll(r)?)),
            None => Ok(None),
        }
    }

    async fn poll_by_message_ref(
        &self,
        message_ref: &MessageRef,
    ) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {POLL_COLUMNS} FROM poll WHERE message_ref = ?"))
            .bind(&message_ref.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        match row {
            Some(ref r) => Ok(Some(row_to_poll(r)?)),
            None => Ok(None),
        }
    }

    async fn attach_message_ref(
        &self,
        id: &PollId,
        message_ref: &MessageRef,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE poll SET message_ref = ? WHERE id = ?")
            .bind(&message_ref.0)
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn set_inactive(&self, id: &PollId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE poll SET active = 0 WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn create_or_overwrite_vote(&self, vote: PollVote) -> Result<(), RepositoryError> {
        // Update and insert must share one transaction: the UPDATE takes
        // the writer lock, so no second ballot for the same voter can
        // slip in between the rows_affected check and the INSERT.
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        let updated = sqlx::query(
            "UPDATE poll_vote SET option_index = ? WHERE poll_id = ? AND voter_id = ?",
        )
        .bind(vote.option_index as i64)
        .bind(&vote.poll_id.0)
        .bind(&vote.voter_id.0)
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO poll_vote (id, poll_id, voter_id, option_index) VALUES (?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&vote.poll_id.0)
            .bind(&vote.voter_id.0)
            .bind(vote.option_index as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)?;
        Ok(())
    }

    async fn append_vote(&self, vote: PollVote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO poll_vote (id, poll_id, voter_id, option_index) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&vote.poll_id.0)
        .bind(&vote.voter_id.0)
        .bind(vote.option_index as i64)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn votes_for_poll(&self, id: &PollId) -> Result<Vec<PollVote>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT poll_id, voter_id, option_index FROM poll_vote WHERE poll_id = ?",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_vote).collect()
    }

    async fn delete_poll_with_votes(&self, id: &PollId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        sqlx::query("DELETE FROM poll_vote WHERE poll_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        sqlx::query("DELETE FROM poll WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;

        tx.commit().await.map_err(backend_error)?;
        Ok(())
    }

    async fn recent_polls(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<Poll>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM poll WHERE guild_id = ?
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(&guild_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_poll).collect()
    }

    async fn active_polls(&self, guild_id: &GuildId) -> Result<Vec<Poll>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM poll WHERE guild_id = ? AND active = 1
             ORDER BY created_at DESC"
        ))
        .bind(&guild_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_poll).collect()
    }

    async fn count_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        count(&self.pool, "SELECT COUNT(*) AS count FROM poll WHERE guild_id = ?", guild_id).await
    }

    async fn count_active_polls(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        count(
            &self.pool,
            "SELECT COUNT(*) AS count FROM poll WHERE guild_id = ? AND active = 1",
            guild_id,
        )
        .await
    }

    async fn count_votes(&self, guild_id: &GuildId) -> Result<u64, RepositoryError> {
        count(
            &self.pool,
            "SELECT COUNT(*) AS count FROM poll_vote v
             JOIN poll p ON p.id = v.poll_id WHERE p.guild_id = ?",
            guild_id,
        )
        .await
    }
}

async fn count(pool: &DbPool, query: &str, guild_id: &GuildId) -> Result<u64, RepositoryError> {
    let count: i64 = sqlx::query(query)
        .bind(&guild_id.0)
        .fetch_one(pool)
        .await
        .map_err(backend_error)?
        .try_get("count")
        .map_err(decode_error)?;

    u64::try_from(count).map_err(decode_error)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use guildhall_core::domain::poll::{MessageRef, Poll, PollId, PollType, PollVote};
    use guildhall_core::domain::profile::{ChannelId, GuildId, UserId};
    use guildhall_core::repository::PollRepository;

    use super::SqlPollRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlPollRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlPollRepository::new(pool)
    }

    fn poll(id: &str, created_offset_secs: i64) -> Poll {
        Poll {
            id: PollId(id.to_string()),
            guild_id: GuildId("G1".to_string()),
            channel_id: ChannelId("C1".to_string()),
            author_id: UserId("author".to_string()),
            question: "Best letter?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            poll_type: PollType::Single,
            duration_hours: 24,
            active: true,
            created_at: Utc.timestamp_opt(1_700_000_000 + created_offset_secs, 0).unwrap(),
            message_ref: None,
        }
    }

    fn vote(poll_id: &str, voter: &str, option_index: usize) -> PollVote {
        PollVote {
            poll_id: PollId(poll_id.to_string()),
            voter_id: UserId(voter.to_string()),
            option_index,
        }
    }

    #[tokio::test]
    async fn poll_round_trips_with_options_and_timestamps_intact() {
        let repo = repo().await;
        let created = poll("p-1", 0);
        repo.create_poll(created.clone()).await.expect("create");

        let stored =
            repo.poll_by_id(&PollId("p-1".to_string())).await.expect("read").expect("poll");
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn message_ref_lookup_finds_exactly_the_attached_poll() {
        let repo = repo().await;
        repo.create_poll(poll("p-1", 0)).await.expect("create");
        repo.create_poll(poll("p-2", 1)).await.expect("create");

        let message_ref = MessageRef("m-1".to_string());
        repo.attach_message_ref(&PollId("p-1".to_string()), &message_ref)
            .await
            .expect("attach");

        let found = repo.poll_by_message_ref(&message_ref).await.expect("lookup").expect("poll");
        assert_eq!(found.id.0, "p-1");
        assert!(repo
            .poll_by_message_ref(&MessageRef("m-unknown".to_string()))
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn overwrite_vote_keeps_one_row_per_voter() {
        let repo = repo().await;
        repo.create_poll(poll("p-1", 0)).await.expect("create");

        repo.create_or_overwrite_vote(vote("p-1", "voter", 0)).await.expect("first vote");
        repo.create_or_overwrite_vote(vote("p-1", "voter", 1)).await.expect("changed vote");

        let votes = repo.votes_for_poll(&PollId("p-1".to_string())).await.expect("votes");
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].option_index, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interleaved_overwrites_never_leave_two_rows_for_one_voter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("votes.db").display());
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = Arc::new(SqlPollRepository::new(pool));
        repo.create_poll(poll("p-1", 0)).await.expect("create");

        for round in 0..20 {
            let zero = tokio::spawn({
                let repo = repo.clone();
                async move { repo.create_or_overwrite_vote(vote("p-1", "voter", 0)).await }
            });
            let one = tokio::spawn({
                let repo = repo.clone();
                async move { repo.create_or_overwrite_vote(vote("p-1", "voter", 1)).await }
            });
            zero.await.expect("join").expect("vote");
            one.await.expect("join").expect("vote");

            let votes = repo.votes_for_poll(&PollId("p-1".to_string())).await.expect("votes");
            assert_eq!(votes.len(), 1, "round {round}");
        }
    }

    #[tokio::test]
    async fn append_vote_accumulates_duplicate_ballots() {
        let repo = repo().await;
        repo.create_poll(poll("p-1", 0)).await.expect("create");

        repo.append_vote(vote("p-1", "voter", 0)).await.expect("first vote");
        repo.append_vote(vote("p-1", "voter", 0)).await.expect("second vote");

        let votes = repo.votes_for_poll(&PollId("p-1".to_string())).await.expect("votes");
        assert_eq!(votes.len(), 2);
    }

    #[tokio::test]
    async fn set_inactive_flips_the_active_flag_only() {
        let repo = repo().await;
        let created = poll("p-1", 0);
        repo.create_poll(created.clone()).await.expect("create");

        repo.set_inactive(&created.id).await.expect("close");
        let stored = repo.poll_by_id(&created.id).await.expect("read").expect("poll");
        assert!(!stored.active);
        assert_eq!(stored.created_at, created.created_at);
    }

    #[tokio::test]
    async fn delete_removes_poll_and_votes_together() {
        let repo = repo().await;
        repo.create_poll(poll("p-1", 0)).await.expect("create");
        repo.append_vote(vote("p-1", "v1", 0)).await.expect("vote");
        repo.append_vote(vote("p-1", "v2", 1)).await.expect("vote");

        repo.delete_poll_with_votes(&PollId("p-1".to_string())).await.expect("delete");

        assert!(repo.poll_by_id(&PollId("p-1".to_string())).await.expect("read").is_none());
        assert!(repo.votes_for_poll(&PollId("p-1".to_string())).await.expect("votes").is_empty());
    }

    #[tokio::test]
    async fn recent_polls_come_back_newest_first() {
        let repo = repo().await;
        repo.create_poll(poll("p-old", 0)).await.expect("create");
        repo.create_poll(poll("p-mid", 100)).await.expect("create");
        repo.create_poll(poll("p-new", 200)).await.expect("create");

        let recent = repo.recent_polls(&GuildId("G1".to_string()), 2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id.0, "p-new");
        assert_eq!(recent[1].id.0, "p-mid");
    }

    #[tokio::test]
    async fn counts_are_scoped_to_the_guild() {
        let repo = repo().await;
        repo.create_poll(poll("p-1", 0)).await.expect("create");
        let mut other_guild = poll("p-2", 1);
        other_guild.guild_id = GuildId("G2".to_string());
        repo.create_poll(other_guild).await.expect("create");
        repo.set_inactive(&PollId("p-1".to_string())).await.expect("close");
        repo.append_vote(vote("p-1", "v1", 0)).await.expect("vote");
        repo.append_vote(vote("p-2", "v1", 0)).await.expect("vote");

        let guild = GuildId("G1".to_string());
        assert_eq!(repo.count_polls(&guild).await.expect("count"), 1);
        assert_eq!(repo.count_active_polls(&guild).await.expect("count"), 0);
        assert_eq!(repo.count_votes(&guild).await.expect("count"), 1);
    }
}
