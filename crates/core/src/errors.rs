use thiserror::Error;

use crate::flows::TurnTransitionError;

/// Failure talking to a remote collaborator (agent service or moderation service).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} returned status {status}: {body}")]
    Status { service: &'static str, status: u16, body: String },
    #[error("{service} response could not be decoded: {message}")]
    Decode { service: &'static str, message: String },
}

impl ServiceError {
    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. } => service,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("run `{run_id}` finished with status `{status}` but no assistant text was found")]
    MissingResponse { run_id: String, status: String },
    #[error("run `{run_id}` was still `{status}` after {deadline_secs}s")]
    DeadlineExceeded { run_id: String, status: String, deadline_secs: u64 },
    #[error(transparent)]
    Transition(#[from] TurnTransitionError),
}

impl TurnError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Service(_) => "the agent service could not be reached",
            Self::MissingResponse { .. } => "the agent did not return a text response",
            Self::DeadlineExceeded { .. } => "the agent took too long to respond",
            Self::Transition(_) => "an internal error occurred",
        }
    }
}
