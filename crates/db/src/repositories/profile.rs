use sqlx::Row;

use guildhall_core::domain::profile::{GuildId, UserId, UserProfile};
use guildhall_core::repository::{ProfileRepository, RepositoryError};

use super::{backend_error, decode_error};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let guild_id: String = row.try_get("guild_id").map_err(decode_error)?;
    let experience: i64 = row.try_get("experience").map_err(decode_error)?;
    let level: i64 = row.try_get("level").map_err(decode_error)?;

    Ok(UserProfile {
        user_id: UserId(user_id),
        guild_id: GuildId(guild_id),
        experience: u64::try_from(experience).map_err(decode_error)?,
        level: u32::try_from(level).map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn get(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, guild_id, experience, level
             FROM user_profile WHERE user_id = ? AND guild_id = ?",
        )
        .bind(&user_id.0)
        .bind(&guild_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_profile (user_id, guild_id, experience, level)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, guild_id) DO UPDATE SET
                 experience = excluded.experience,
                 level = excluded.level",
        )
        .bind(&profile.user_id.0)
        .bind(&profile.guild_id.0)
        .bind(profile.experience as i64)
        .bind(i64::from(profile.level))
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn top(
        &self,
        guild_id: &GuildId,
        limit: u32,
    ) -> Result<Vec<UserProfile>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT user_id, guild_id, experience, level
             FROM user_profile WHERE guild_id = ?
             ORDER BY level DESC, experience DESC
             LIMIT ?",
        )
        .bind(&guild_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_profile).collect()
    }
}
