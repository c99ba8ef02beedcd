use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the remote collaborators (lookup, scoring, persistence).
#[derive(Error, Debug)]
pub enum PortError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for PortError {
    fn from(e: reqwest::Error) -> Self {
        PortError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for PortError {
    fn from(e: serde_json::Error) -> Self {
        PortError::Malformed(e.to_string())
    }
}

/// Errors surfaced at the workflow controller boundary.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("video is {size} bytes; the limit is {limit} bytes (30 MiB)")]
    MediaTooLarge { size: u64, limit: u64 },

    #[error("unsupported media type {0}; select a video file")]
    UnsupportedMedia(String),

    #[error("cannot open selected file: {0}")]
    MediaUnavailable(#[source] std::io::Error),

    #[error("no student found for id {0}")]
    StudentNotFound(String),

    #[error("student lookup failed: {0}")]
    Lookup(#[source] PortError),

    #[error("could not read the selected video")]
    Decode(#[source] std::io::Error),

    #[error("scoring failed: {0}")]
    Scoring(#[source] PortError),

    #[error("saving results failed: {0}")]
    Persistence(String),

    #[error("analysis aborted: {0}")]
    Runtime(String),

    #[error("an analysis is already running")]
    Busy,
}

/// Coarse error category, carried in events and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Validation,
    Lookup,
    Decode,
    Scoring,
    Persistence,
    Runtime,
}

impl WorkflowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkflowError::MediaTooLarge { .. }
            | WorkflowError::UnsupportedMedia(_)
            | WorkflowError::MediaUnavailable(_)
            | WorkflowError::Busy => FailureKind::Validation,
            WorkflowError::StudentNotFound(_) | WorkflowError::Lookup(_) => FailureKind::Lookup,
            WorkflowError::Decode(_) => FailureKind::Decode,
            WorkflowError::Scoring(_) => FailureKind::Scoring,
            WorkflowError::Persistence(_) => FailureKind::Persistence,
            WorkflowError::Runtime(_) => FailureKind::Runtime,
        }
    }
}
