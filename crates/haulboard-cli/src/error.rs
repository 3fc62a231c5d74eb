use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] haulboard_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Schedule ID cannot be empty")]
    EmptyScheduleId,
    #[error("Schedule not found for id/prefix: {0}")]
    ScheduleNotFound(String),
    #[error("{0}")]
    AmbiguousScheduleId(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Move conflicts with {0}; rerun with --force to keep it")]
    Conflict(String),
    #[error("Move was not committed: {0}")]
    NotCommitted(String),
}
