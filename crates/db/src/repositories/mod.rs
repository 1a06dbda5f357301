//! Sqlite-backed implementations of the core repository traits, plus
//! in-memory equivalents for tests and local development.

use guildhall_core::repository::RepositoryError;

pub mod memory;
pub mod poll;
pub mod profile;

pub use memory::{InMemoryPollRepository, InMemoryProfileRepository};
pub use poll::SqlPollRepository;
pub use profile::SqlProfileRepository;

/// Driver errors are flattened to strings at this boundary so the core
/// never depends on sqlx types.
pub(crate) fn backend_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::backend(error.to_string())
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::decode(error.to_string())
}
