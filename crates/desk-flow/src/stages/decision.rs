//! Chooses the action for the active task

use desk_ai::Intent;

use crate::stage::StageResult;
use crate::state::{Action, ConversationState, StateUpdate, Status};

/// Pure decision over the merged state
pub fn decide(state: &ConversationState) -> (Action, Status) {
    if state.error.is_some() {
        return (Action::Reject, Status::Failed);
    }
    match state.intent {
        Intent::PolicyQuery | Intent::General => (Action::Answer, Status::ReadyForDecision),
        Intent::Incident | Intent::ServiceRequest => {
            if !state.missing_fields.is_empty() {
                (Action::AskUser, Status::AwaitingUser)
            } else if !state.validation_passed {
                (Action::Reject, Status::Failed)
            } else if state.awaiting_confirmation && !state.confirmed {
                (Action::AskUser, Status::AwaitingUser)
            } else {
                (Action::CreateTicket, Status::ReadyForDecision)
            }
        }
    }
}

pub fn run(state: &ConversationState) -> StageResult {
    let (action, status) = decide(state);
    tracing::debug!("Decision for {}: {:?} / {}", state.intent, action, status);
    Ok(StateUpdate::new().action(action).status(status))
}
