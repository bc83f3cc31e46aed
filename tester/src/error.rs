//! Harness error taxonomy
//!
//! Retry inside the polling verifier is confined to `TransientQuery`;
//! every other kind is fatal to the scenario that observes it.

use shared::{NodeRole, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Duplicate node {role}-{id} in topology")]
    DuplicateNode { role: NodeRole, id: u32 },

    #[error("Failed to launch {role}-{id}: {source}")]
    StartupFailure {
        role: NodeRole,
        id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Topology exited prematurely: {reason}")]
    PrematureExit { reason: String },

    #[error("Query not satisfied yet: {message}")]
    TransientQuery { message: String },

    #[error("Unexpected query warnings: {warnings:?}")]
    UnexpectedWarnings { warnings: Vec<String> },

    #[error("Unexpected result size {actual}, expected {expected}")]
    SeriesCountMismatch { expected: usize, actual: usize },

    #[error("Series {index} mismatch: expected {expected}, got {actual}")]
    SeriesMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Deadline exceeded after {attempts} attempts; last state: {last}")]
    DeadlineExceeded { attempts: u64, last: String },

    #[error("Unknown scenario '{name}'; available: {available}")]
    UnknownScenario { name: String, available: String },

    #[error("Shared component error")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::TransientQuery {
            message: err.to_string(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
