//! Typed poll result views.
//!
//! Views are plain values rebuilt from scratch on every tally and handed
//! to the gateway for rendering; nothing downstream mutates them. Vote
//! counts are the only voter-derived data here, so anonymous polls need
//! no special casing.

use crate::domain::poll::Poll;
use crate::polls::TallyRow;

const BAR_WIDTH: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct PollResultView {
    pub title: String,
    pub rows: Vec<PollResultRow>,
    pub footer: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PollResultRow {
    pub symbol: String,
    pub label: String,
    pub count: u64,
    /// Rounded to a whole percent for display.
    pub percent: u8,
    pub bar: String,
}

impl PollResultView {
    pub fn build(poll: &Poll, tally: &[TallyRow], symbols: &[String]) -> Self {
        let rows = tally
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let percent = row.percentage.round() as u8;
                PollResultRow {
                    symbol: symbols.get(index).cloned().unwrap_or_default(),
                    label: row.option.clone(),
                    count: row.vote_count,
                    percent,
                    bar: progress_bar(percent),
                }
            })
            .collect();

        let total_votes: u64 = tally.iter().map(|row| row.vote_count).sum();
        let status = if poll.active { "active" } else { "closed" };

        Self {
            title: format!("📊 {}", poll.question),
            rows,
            footer: format!(
                "{} poll · {} · {} vote{}",
                poll.poll_type.as_str(),
                status,
                total_votes,
                if total_votes == 1 { "" } else { "s" }
            ),
        }
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = (usize::from(percent) * BAR_WIDTH) / 100;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}
