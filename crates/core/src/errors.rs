use thiserror::Error;

use crate::domain::poll::PollId;
use crate::repository::RepositoryError;

/// User-facing denials and validation failures on the poll path.
///
/// Everything except `Repository` is surfaced to the invoking user and
/// never retried; repository failures on write paths propagate so the
/// caller can report that the action did not take effect.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("a poll needs between {min} and {max} options, got {given}")]
    InvalidOptionCount { given: usize, min: usize, max: usize },
    #[error("poll {0} does not exist")]
    NotFound(PollId),
    #[error("poll {0} is already closed")]
    Closed(PollId),
    #[error("option {index} is out of range for a poll with {option_count} options")]
    InvalidOption { index: usize, option_count: usize },
    #[error("only the poll author or an admin may delete a poll")]
    NotAuthorized,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PollError {
    /// Denials a stray inbound event may trigger without it being a bug.
    /// Event handlers log these and move on instead of failing the loop.
    pub fn is_user_denial(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}
