use thiserror::Error;

use crate::flows::states::{TurnEvent, TurnState, TurnTransition};

/// Transition table for a single conversational turn.
///
/// `Delivered` is only reachable through `OutputModeration`, which is only
/// reachable after `InputModeration` cleared the input, so no path delivers
/// text that skipped either moderation check.
#[derive(Clone, Debug, Default)]
pub struct TurnFlow;

impl TurnFlow {
    pub fn initial_state(&self) -> TurnState {
        TurnState::Start
    }

    pub fn apply(
        &self,
        current: TurnState,
        event: TurnEvent,
    ) -> Result<TurnTransition, TurnTransitionError> {
        transition_turn(current, event)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("invalid turn transition from {state:?} using event {event:?}")]
    InvalidTransition { state: TurnState, event: TurnEvent },
    #[error("turn already finished in {state:?}")]
    AlreadyTerminal { state: TurnState },
}

fn transition_turn(
    current: TurnState,
    event: TurnEvent,
) -> Result<TurnTransition, TurnTransitionError> {
    use TurnEvent::{
        BackendFailed, DeadlineExceeded, InputBlank, InputCleared, InputFlagged, InputPresent,
        OutputCleared, OutputFlagged, ResponseFound, ResponseMissing, RunCreated, RunFinished,
        RunStillActive,
    };
    use TurnState::{
        BlockedInput, BlockedOutput, Delivered, Failed, InputEmpty, InputModeration,
        OutputModeration, Polling, Retrieve, Start, Submit,
    };

    if current.is_terminal() {
        return Err(TurnTransitionError::AlreadyTerminal { state: current });
    }

    let to = match (current, event) {
        (Start, InputBlank) => InputEmpty,
        (Start, InputPresent) => InputModeration,
        (InputModeration, InputFlagged) => BlockedInput,
        (InputModeration, InputCleared) => Submit,
        (Submit, RunCreated) => Polling,
        (Polling, RunStillActive) => Polling,
        (Polling, RunFinished) => Retrieve,
        (Polling, DeadlineExceeded) => Failed,
        (Retrieve, ResponseFound) => OutputModeration,
        (Retrieve, ResponseMissing) => Failed,
        (OutputModeration, OutputFlagged) => BlockedOutput,
        (OutputModeration, OutputCleared) => Delivered,
        (Submit, BackendFailed) | (Polling, BackendFailed) | (Retrieve, BackendFailed) => Failed,
        _ => return Err(TurnTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TurnTransition { from: current, to, event })
}
