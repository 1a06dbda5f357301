use async_trait::async_trait;
use thiserror::Error;

use guildhall_core::domain::poll::{PollId, PollType};

use crate::embeds::{self, MessageBody};

/// Raw slash-command invocation as delivered by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub guild_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    PollCreate {
        question: String,
        options: Vec<String>,
        poll_type: PollType,
        duration_hours: Option<u32>,
    },
    PollClose { poll_id: PollId },
    /// Without an id, lists the guild's currently active polls instead.
    PollResults { poll_id: Option<PollId> },
    PollDelete { poll_id: PollId },
    PollStats,
    Rank { target_user_id: Option<String> },
    Leaderboard { limit: Option<u32> },
    Help,
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("unterminated quoted argument")]
    UnterminatedQuote,
    #[error("`/poll {0}` needs a poll id")]
    MissingPollId(String),
    #[error("poll creation needs a quoted question followed by quoted options")]
    MissingQuestion,
    #[error("unknown poll type `{0}` (expected single|multiple|anonymous)")]
    UnknownPollType(String),
    #[error("invalid value for `{flag}`: `{value}`")]
    InvalidFlagValue { flag: &'static str, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// Parses one slash-command payload into a typed command.
pub fn parse_command(payload: &SlashCommandPayload) -> Result<BotCommand, CommandParseError> {
    match payload.command.as_str() {
        "/poll" => parse_poll_command(&payload.text),
        "/rank" => Ok(BotCommand::Rank { target_user_id: parse_mention(payload.text.trim()) }),
        "/leaderboard" => {
            let text = payload.text.trim();
            if text.is_empty() {
                return Ok(BotCommand::Leaderboard { limit: None });
            }
            let limit = text.parse::<u32>().map_err(|_| CommandParseError::InvalidFlagValue {
                flag: "limit",
                value: text.to_string(),
            })?;
            Ok(BotCommand::Leaderboard { limit: Some(limit) })
        }
        other => Err(CommandParseError::UnsupportedCommand(other.to_string())),
    }
}

fn parse_poll_command(text: &str) -> Result<BotCommand, CommandParseError> {
    let tokens = split_quoted(text)?;
    let Some((verb, rest)) = tokens.split_first() else {
        return Ok(BotCommand::Help);
    };

    match verb.to_ascii_lowercase().as_str() {
        "create" => parse_poll_create(rest),
        "close" => pull_poll_id("close", rest).map(|poll_id| BotCommand::PollClose { poll_id }),
        "results" => Ok(BotCommand::PollResults {
            poll_id: rest.first().map(|token| PollId(token.clone())),
        }),
        "delete" => pull_poll_id("delete", rest).map(|poll_id| BotCommand::PollDelete { poll_id }),
        "stats" => Ok(BotCommand::PollStats),
        "help" => Ok(BotCommand::Help),
        other => Ok(BotCommand::Unknown { verb: other.to_string() }),
    }
}

fn parse_poll_create(tokens: &[String]) -> Result<BotCommand, CommandParseError> {
    let mut positional = Vec::new();
    let mut poll_type = PollType::Single;
    let mut duration_hours = None;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "--type" => {
                let value = iter.next().ok_or(CommandParseError::InvalidFlagValue {
                    flag: "--type",
                    value: String::new(),
                })?;
                poll_type = PollType::parse(value)
                    .ok_or_else(|| CommandParseError::UnknownPollType(value.clone()))?;
            }
            "--hours" => {
                let value = iter.next().ok_or(CommandParseError::InvalidFlagValue {
                    flag: "--hours",
                    value: String::new(),
                })?;
                let hours =
                    value.parse::<u32>().map_err(|_| CommandParseError::InvalidFlagValue {
                        flag: "--hours",
                        value: value.clone(),
                    })?;
                duration_hours = Some(hours);
            }
            _ => positional.push(token.clone()),
        }
    }

    let Some((question, options)) = positional.split_first() else {
        return Err(CommandParseError::MissingQuestion);
    };

    Ok(BotCommand::PollCreate {
        question: question.clone(),
        options: options.to_vec(),
        poll_type,
        duration_hours,
    })
}

fn pull_poll_id(verb: &str, tokens: &[String]) -> Result<PollId, CommandParseError> {
    tokens
        .first()
        .map(|token| PollId(token.clone()))
        .ok_or_else(|| CommandParseError::MissingPollId(verb.to_string()))
}

fn parse_mention(text: &str) -> Option<String> {
    let inner = text.strip_prefix("<@")?.strip_suffix('>')?;
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Whitespace tokenizer that keeps double-quoted segments intact.
fn split_quoted(text: &str) -> Result<Vec<String>, CommandParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in text.chars() {
        match ch {
            '"' => {
                if in_quotes {
                    tokens.push(std::mem::take(&mut current));
                }
                in_quotes = !in_quotes;
            }
            ch if ch.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }

    if in_quotes {
        return Err(CommandParseError::UnterminatedQuote);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

#[async_trait]
pub trait BotCommandService: Send + Sync {
    async fn create_poll(
        &self,
        question: String,
        options: Vec<String>,
        poll_type: PollType,
        duration_hours: Option<u32>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn close_poll(
        &self,
        poll_id: PollId,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn poll_results(
        &self,
        poll_id: Option<PollId>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn delete_poll(
        &self,
        poll_id: PollId,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn poll_stats(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn rank(
        &self,
        target_user_id: Option<String>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;

    async fn leaderboard(
        &self,
        limit: Option<u32>,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: BotCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        command: BotCommand,
        payload: &SlashCommandPayload,
    ) -> Result<MessageBody, CommandRouteError> {
        match command {
            BotCommand::PollCreate { question, options, poll_type, duration_hours } => {
                self.service
                    .create_poll(question, options, poll_type, duration_hours, payload)
                    .await
            }
            BotCommand::PollClose { poll_id } => self.service.close_poll(poll_id, payload).await,
            BotCommand::PollResults { poll_id } => {
                self.service.poll_results(poll_id, payload).await
            }
            BotCommand::PollDelete { poll_id } => {
                self.service.delete_poll(poll_id, payload).await
            }
            BotCommand::PollStats => self.service.poll_stats(payload).await,
            BotCommand::Rank { target_user_id } => {
                self.service.rank(target_user_id, payload).await
            }
            BotCommand::Leaderboard { limit } => self.service.leaderboard(limit, payload).await,
            BotCommand::Help => Ok(embeds::help_message()),
            BotCommand::Unknown { verb } => Ok(embeds::error_message(&format!(
                "Unsupported command `/poll {verb}`. Try `/poll help`."
            ))),
        }
    }
}
