use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// One leveling profile per (user, guild) pair.
///
/// `level` is a cached derivation of `experience` against the growth curve
/// in [`crate::leveling`]; the two fields are always recomputed and
/// persisted together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub experience: u64,
    pub level: u32,
}

impl UserProfile {
    pub fn fresh(user_id: UserId, guild_id: GuildId) -> Self {
        Self { user_id, guild_id, experience: 0, level: 1 }
    }
}
