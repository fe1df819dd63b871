//! Error types for the module snooper pipeline
//!
//! Every variant is recoverable at the level of one unit of work (a log file or a Job ID)
//! and carries enough context to re-run just that unit.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for snooper operations
pub type Result<T> = std::result::Result<T, SnoopError>;

/// Main error type for the snooper pipeline
#[derive(Error, Debug)]
pub enum SnoopError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to open {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Scheduler query failed for job {job_id}: {message}")]
    SchedulerQuery { job_id: String, message: String },

    #[error("Unknown job state code '{code}' for job {job_id}")]
    UnknownJobState { job_id: String, code: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl SnoopError {
    pub fn file_read(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn scheduler_query(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchedulerQuery {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn unknown_job_state(job_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self::UnknownJobState {
            job_id: job_id.into(),
            code: code.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// The log file path or Job ID this error is about, if any.
    pub fn unit(&self) -> Option<String> {
        match self {
            Self::FileRead { path, .. } | Self::Parse { path, .. } => {
                Some(path.display().to_string())
            },
            Self::SchedulerQuery { job_id, .. } | Self::UnknownJobState { job_id, .. } => {
                Some(job_id.clone())
            },
            _ => None,
        }
    }
}
