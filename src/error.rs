use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleViewError {
    #[error("timed out after {timeout:?} waiting for samples of '{channel}'")]
    LockTimeout { channel: String, timeout: Duration },
    #[error("sample {index} of '{channel}' not readable (buffer holds {len})")]
    BufferAccess { channel: String, index: usize, len: usize },
    #[error("sample at {time} is older than last sample at {last} in '{channel}'")]
    OutOfOrder {
        channel: String,
        time: DateTime<Utc>,
        last: DateTime<Utc>,
    },
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("channel '{0}' already exists")]
    DuplicateChannel(String),
}

impl SampleViewError {
    /// Channel the error is about.
    pub fn channel(&self) -> &str {
        match self {
            SampleViewError::LockTimeout { channel, .. }
            | SampleViewError::BufferAccess { channel, .. }
            | SampleViewError::OutOfOrder { channel, .. } => channel,
            SampleViewError::UnknownChannel(channel) | SampleViewError::DuplicateChannel(channel) => channel,
        }
    }
}

pub type Result<T, E = SampleViewError> = std::result::Result<T, E>;
