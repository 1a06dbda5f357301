//! Typed message bodies and embed builders.
//!
//! Outbound messages are built as plain values and handed to the
//! gateway; nothing here talks to the network.

use serde::Serialize;

use guildhall_core::domain::poll::Poll;
use guildhall_core::domain::profile::UserProfile;
use guildhall_core::leveling::LevelSummary;
use guildhall_core::polls::PollStats;
use guildhall_core::view::PollResultView;

pub const COLOR_PRIMARY: u32 = 0x5865F2;
pub const COLOR_SUCCESS: u32 = 0x57F287;
pub const COLOR_ERROR: u32 = 0xED4245;
pub const COLOR_NEUTRAL: u32 = 0x99AAB5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub color: u32,
}

/// One outbound message: optional plain content plus optional embed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), embed: None }
    }

    pub fn embed(embed: Embed) -> Self {
        Self { content: None, embed: Some(embed) }
    }
}

pub struct EmbedBuilder {
    title: String,
    description: Option<String>,
    fields: Vec<EmbedField>,
    footer: Option<String>,
    color: u32,
}

impl EmbedBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            fields: Vec::new(),
            footer: None,
            color: COLOR_PRIMARY,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline: false });
        self
    }

    pub fn inline_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline: true });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn build(self) -> Embed {
        Embed {
            title: self.title,
            description: self.description,
            fields: self.fields,
            footer: self.footer,
            color: self.color,
        }
    }
}

/// Renders a poll result view into an embed, one field per option.
pub fn poll_embed(view: &PollResultView) -> MessageBody {
    let mut builder = EmbedBuilder::new(view.title.clone()).footer(view.footer.clone());
    for row in &view.rows {
        builder = builder.field(
            format!("{} {}", row.symbol, row.label),
            format!("{} · {} ({}%)", row.bar, row.count, row.percent),
        );
    }
    MessageBody::embed(builder.build())
}

pub fn rank_embed(user_mention: &str, summary: &LevelSummary) -> MessageBody {
    MessageBody::embed(
        EmbedBuilder::new("Rank")
            .description(format!("Progress for {user_mention}"))
            .inline_field("Level", summary.level.to_string())
            .inline_field("Total XP", summary.xp.to_string())
            .inline_field(
                "Next level",
                format!("{} XP to go (needs {})", summary.xp_to_next, summary.required_xp),
            )
            .build(),
    )
}

pub fn leaderboard_embed(profiles: &[UserProfile]) -> MessageBody {
    if profiles.is_empty() {
        return MessageBody::embed(
            EmbedBuilder::new("🏆 Leaderboard")
                .description("Nobody has earned XP yet.")
                .color(COLOR_NEUTRAL)
                .build(),
        );
    }

    let mut builder = EmbedBuilder::new("🏆 Leaderboard");
    for (rank, profile) in profiles.iter().enumerate() {
        builder = builder.field(
            format!("#{} <@{}>", rank + 1, profile.user_id.0),
            format!("Level {} · {} XP", profile.level, profile.experience),
        );
    }
    MessageBody::embed(builder.build())
}

pub fn active_polls_embed(polls: &[Poll]) -> MessageBody {
    if polls.is_empty() {
        return MessageBody::embed(
            EmbedBuilder::new("🗳️ Active polls")
                .description("No polls are running right now.")
                .color(COLOR_NEUTRAL)
                .build(),
        );
    }

    let mut builder = EmbedBuilder::new("🗳️ Active polls")
        .footer("Use `/poll results <id>` for the full tally.");
    for poll in polls {
        builder = builder.field(
            poll.question.clone(),
            format!("`{}` · {} poll · {} options", poll.id, poll.poll_type.as_str(), poll.options.len()),
        );
    }
    MessageBody::embed(builder.build())
}

pub fn poll_stats_embed(stats: &PollStats) -> MessageBody {
    let mut builder = EmbedBuilder::new("📈 Poll statistics")
        .inline_field("Total polls", stats.total_polls.to_string())
        .inline_field("Active polls", stats.active_polls.to_string())
        .inline_field("Total votes", stats.total_votes.to_string());

    for entry in &stats.recent {
        let status = if entry.poll.active { "active" } else { "closed" };
        builder = builder.field(
            entry.poll.question.clone(),
            format!("{} vote{} · {status}", entry.vote_count, plural(entry.vote_count)),
        );
    }
    MessageBody::embed(builder.build())
}

pub fn error_message(detail: &str) -> MessageBody {
    MessageBody::embed(
        EmbedBuilder::new("Something went wrong").description(detail).color(COLOR_ERROR).build(),
    )
}

pub fn help_message() -> MessageBody {
    MessageBody::embed(
        EmbedBuilder::new("Guildhall commands")
            .field("/poll create \"question\" \"option\"...", "Start a poll (`--type single|multiple|anonymous`, `--hours N`)")
            .field("/poll close <id>", "Close a poll and post the final tally")
            .field("/poll results [id]", "Show a tally, or list active polls")
            .field("/poll delete <id>", "Delete a poll (author or admin only)")
            .field("/poll stats", "Poll totals for this server")
            .field("/rank", "Your level and XP progress")
            .field("/leaderboard", "Top members by level")
            .color(COLOR_NEUTRAL)
            .build(),
    )
}

fn plural(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
