use serde::{Deserialize, Serialize};

use crate::domain::turn::TurnOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Start,
    InputEmpty,
    InputModeration,
    BlockedInput,
    Submit,
    Polling,
    Retrieve,
    OutputModeration,
    BlockedOutput,
    Delivered,
    Failed,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<TurnOutcome> {
        match self {
            Self::InputEmpty => Some(TurnOutcome::Empty),
            Self::BlockedInput => Some(TurnOutcome::BlockedInput),
            Self::BlockedOutput => Some(TurnOutcome::BlockedOutput),
            Self::Delivered => Some(TurnOutcome::Delivered),
            Self::Failed => Some(TurnOutcome::Failed),
            Self::Start
            | Self::InputModeration
            | Self::Submit
            | Self::Polling
            | Self::Retrieve
            | Self::OutputModeration => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    InputBlank,
    InputPresent,
    InputCleared,
    InputFlagged,
    RunCreated,
    RunStillActive,
    RunFinished,
    ResponseFound,
    ResponseMissing,
    OutputCleared,
    OutputFlagged,
    BackendFailed,
    DeadlineExceeded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTransition {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
}
