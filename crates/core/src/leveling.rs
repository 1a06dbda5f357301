//! Message-driven XP grants and level transitions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::warn;

use crate::config::LevelingConfig;
use crate::cooldown::CooldownTracker;
use crate::domain::profile::{ChannelId, GuildId, UserId, UserProfile};
use crate::repository::ProfileRepository;

/// XP needed to advance from `level` to `level + 1`.
///
/// The curve is `floor(100 * 1.5^(level - 1))`: 100 to leave level 1,
/// 150 to leave level 2, 225 to leave level 3, and so on.
pub fn required_xp(level: u32) -> u64 {
    (100.0 * 1.5f64.powi(level as i32 - 1)).floor() as u64
}

/// Total XP needed to reach `level` from zero, i.e. the running sum of
/// [`required_xp`] over levels `1..level`. Level 1 costs nothing.
pub fn cumulative_xp_to_reach(level: u32) -> u64 {
    (1..level).map(required_xp).sum()
}

/// Largest level whose cumulative requirement is covered by `total_xp`.
///
/// Computed by iterative accumulation rather than inverting the curve,
/// so level boundaries are exact and free of floating-point drift.
pub fn calculate_level(total_xp: u64) -> u32 {
    let mut level = 1;
    let mut cumulative = 0u64;

    loop {
        // Once the next threshold no longer fits in u64, no total can
        // reach it and the current level is final.
        let Some(next) = cumulative.checked_add(required_xp(level)) else {
            return level;
        };
        if total_xp < next {
            return level;
        }
        cumulative = next;
        level += 1;
    }
}

/// Outcome of a successful XP grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XpGrant {
    pub xp_gained: u64,
    pub new_level: u32,
    pub total_xp: u64,
    pub leveled_up: bool,
}

/// Read-only view of a user's progress within the curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSummary {
    pub level: u32,
    pub xp: u64,
    /// XP still missing before the next level, measured against the
    /// current level's own requirement.
    pub xp_to_next: u64,
    pub required_xp: u64,
}

pub struct LevelingEngine {
    profiles: Arc<dyn ProfileRepository>,
    config: LevelingConfig,
    cooldowns: CooldownTracker,
}

impl LevelingEngine {
    pub fn new(profiles: Arc<dyn ProfileRepository>, config: LevelingConfig) -> Self {
        Self { profiles, config, cooldowns: CooldownTracker::new() }
    }

    /// Whether a posted message is eligible for XP at all, before any
    /// cooldown or storage concerns.
    pub fn message_qualifies(&self, channel_id: &ChannelId, text_length: usize) -> bool {
        if text_length < self.config.min_message_chars {
            return false;
        }
        !self.config.excluded_channels.iter().any(|excluded| excluded == &channel_id.0)
    }

    /// Grants randomized XP for one qualifying message.
    ///
    /// Returns `None` when the (user, guild) pair is still inside its
    /// cooldown window, and degrades to `None` on storage failure so a
    /// transient outage costs one message's bonus XP instead of failing
    /// the event handler. The cooldown is consumed up front either way.
    pub async fn grant_xp_for_message(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
        role_ids: &[String],
        now: DateTime<Utc>,
    ) -> Option<XpGrant> {
        let key = format!("{}:{}", user_id.0, guild_id.0);
        let window = Duration::seconds(self.config.xp_cooldown_secs as i64);
        if !self.cooldowns.try_consume(&key, window, now) {
            return None;
        }

        let base_xp =
            rand::thread_rng().gen_range(self.config.xp_per_message_min..=self.config.xp_per_message_max);
        let xp_gained = scale_by_multiplier(base_xp, self.role_multiplier(role_ids));

        let profile = match self.profiles.get(user_id, guild_id).await {
            Ok(found) => found
                .unwrap_or_else(|| UserProfile::fresh(user_id.clone(), guild_id.clone())),
            Err(error) => {
                warn!(user = %user_id.0, guild = %guild_id.0, %error, "profile lookup failed, skipping grant");
                return None;
            }
        };

        let previous_level = profile.level;
        let total_xp = profile.experience + xp_gained;
        let new_level = calculate_level(total_xp);

        let updated = UserProfile {
            user_id: user_id.clone(),
            guild_id: guild_id.clone(),
            experience: total_xp,
            level: new_level,
        };
        if let Err(error) = self.profiles.upsert(updated).await {
            warn!(user = %user_id.0, guild = %guild_id.0, %error, "profile update failed, skipping grant");
            return None;
        }

        Some(XpGrant { xp_gained, new_level, total_xp, leveled_up: new_level > previous_level })
    }

    /// Current progress for a user, initializing a zero-XP profile on
    /// first sight. Storage failures fall back to the fresh default so
    /// a level query never errors out toward the user.
    pub async fn get_user_level(&self, user_id: &UserId, guild_id: &GuildId) -> LevelSummary {
        let profile = match self.profiles.get(user_id, guild_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                let fresh = UserProfile::fresh(user_id.clone(), guild_id.clone());
                if let Err(error) = self.profiles.upsert(fresh.clone()).await {
                    warn!(user = %user_id.0, guild = %guild_id.0, %error, "profile initialization failed");
                }
                fresh
            }
            Err(error) => {
                warn!(user = %user_id.0, guild = %guild_id.0, %error, "profile lookup failed, using default");
                UserProfile::fresh(user_id.clone(), guild_id.clone())
            }
        };

        let required = required_xp(profile.level);
        LevelSummary {
            level: profile.level,
            xp: profile.experience,
            xp_to_next: required.saturating_sub(profile.experience),
            required_xp: required,
        }
    }

    /// Leaderboard read: level descending, ties broken by experience.
    /// Degrades to an empty board on storage failure.
    pub async fn top_users(&self, guild_id: &GuildId, limit: u32) -> Vec<UserProfile> {
        match self.profiles.top(guild_id, limit).await {
            Ok(profiles) => profiles,
            Err(error) => {
                warn!(guild = %guild_id.0, %error, "leaderboard query failed");
                Vec::new()
            }
        }
    }

    /// Picks one of the configured announcement templates at random and
    /// fills in the `{user}` and `{level}` placeholders.
    pub fn level_up_message(&self, user_mention: &str, level: u32) -> String {
        let templates = &self.config.level_up_messages;
        let index = rand::thread_rng().gen_range(0..templates.len());
        render_template(&templates[index], user_mention, level)
    }

    fn role_multiplier(&self, role_ids: &[String]) -> f64 {
        role_ids
            .iter()
            .filter_map(|role| self.config.role_multipliers.get(role))
            .copied()
            .fold(1.0, f64::max)
    }
}

fn scale_by_multiplier(base_xp: u64, multiplier: f64) -> u64 {
    (base_xp as f64 * multiplier).floor() as u64
}

fn render_template(template: &str, user_mention: &str, level: u32) -> String {
    template.replace("{user}", user_mention).replace("{level}", &level.to_string())
}
