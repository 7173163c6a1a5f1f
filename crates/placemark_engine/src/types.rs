use std::fmt;

use serde::Deserialize;

/// Remote-side lifecycle of an extraction job.
///
/// `Complete` and `Failed` are authoritative terminal states and are never
/// overridden locally; timing out is a client-side outcome, see
/// [`PollOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// One snapshot of a job as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub result_payload: Option<serde_json::Value>,
}

/// Final result of polling one job to rest.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Remote reported success; payload is whatever structured data it
    /// attached to the terminal status.
    Complete { payload: Option<serde_json::Value> },
    /// Remote explicitly reported failure.
    Failed { payload: Option<serde_json::Value> },
    /// Attempt budget or wall-clock expiry hit while the remote state was
    /// still non-terminal. Distinct from `Failed`.
    TimedOut,
    /// The caller cancelled the loop.
    Cancelled,
}

/// Progress notification emitted on each successful non-terminal status fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollUpdate {
    pub job_id: String,
    pub state: JobState,
    pub progress_percent: u8,
}

/// Error from the remote capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteFailureKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for RemoteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailureKind::InvalidUrl => write!(f, "invalid url"),
            RemoteFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            RemoteFailureKind::Timeout => write!(f, "timeout"),
            RemoteFailureKind::Network => write!(f, "network error"),
            RemoteFailureKind::Decode => write!(f, "decode error"),
        }
    }
}
