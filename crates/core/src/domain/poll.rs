use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::profile::{ChannelId, GuildId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollId(pub String);

impl PollId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to the rendered result view in the chat platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollType {
    /// One vote per voter; a repeat vote overwrites the previous choice.
    Single,
    /// Unlimited votes per voter, never deduplicated.
    Multiple,
    /// Single-vote storage semantics with voter identity hidden from views.
    Anonymous,
}

impl PollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Anonymous => "anonymous",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "multiple" => Some(Self::Multiple),
            "anonymous" => Some(Self::Anonymous),
            _ => None,
        }
    }

    /// Single and Anonymous share the one-row-per-voter storage model.
    pub fn overwrites_repeat_votes(&self) -> bool {
        matches!(self, Self::Single | Self::Anonymous)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub question: String,
    /// Fixed at creation; order defines the option index space.
    pub options: Vec<String>,
    pub poll_type: PollType,
    /// Zero means the poll stays open until closed manually.
    pub duration_hours: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub message_ref: Option<MessageRef>,
}

impl Poll {
    /// Deadline for the one-shot expiry timer, when one applies.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.duration_hours == 0 {
            return None;
        }
        Some(self.created_at + Duration::hours(i64::from(self.duration_hours)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollVote {
    pub poll_id: PollId,
    pub voter_id: UserId,
    pub option_index: usize,
}
