//! Shared error types for the e2e harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unexpected query response shape: {message}")]
    MalformedResponse { message: String },

    #[error("Invalid sample value: {input}")]
    InvalidSampleValue { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
