//! Error types for vibedaw

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VibeDawError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A note that cannot be played even after clamping
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidNoteError {
    #[error("step {0} is negative or not a number")]
    Step(f64),
    #[error("duration {0} is not a positive number of steps")]
    Duration(f64),
}

pub type Result<T> = std::result::Result<T, VibeDawError>;
