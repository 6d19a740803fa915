//! Stage identifiers and the transition table

use std::fmt;

use desk_ai::Intent;
use serde::{Deserialize, Serialize};

use crate::state::{Action, ConversationState, StateUpdate, Status};

/// One processing step of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Interprets a reply to a pending confirmation prompt
    ConfirmReply,
    Split,
    /// Issues the confirmation prompt for a freshly split batch
    ConfirmGate,
    Route,
    Retrieve,
    Collect,
    Validate,
    Decide,
    Execute,
    Respond,
    Advance,
}

impl Stage {
    /// Every turn starts here
    pub const ENTRY: Stage = Stage::ConfirmReply;

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ConfirmReply => "confirm_reply",
            Stage::Split => "split",
            Stage::ConfirmGate => "confirm_gate",
            Stage::Route => "route",
            Stage::Retrieve => "retrieve",
            Stage::Collect => "collect",
            Stage::Validate => "validate",
            Stage::Decide => "decide",
            Stage::Execute => "execute",
            Stage::Respond => "respond",
            Stage::Advance => "advance",
        }
    }

    /// Prefix used in error strings raised by this stage
    pub fn error_tag(&self) -> &'static str {
        match self {
            Stage::ConfirmReply | Stage::ConfirmGate => "confirmation",
            Stage::Split => "splitter",
            Stage::Route => "router",
            Stage::Retrieve => "policy",
            Stage::Collect => "metadata",
            Stage::Validate => "validation",
            Stage::Decide => "decision",
            Stage::Execute => "execution",
            Stage::Respond => "response",
            Stage::Advance => "task_progress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault caught at a stage boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub detail: String,
}

impl StageFailure {
    pub fn new(stage: Stage, detail: impl fmt::Display) -> Self {
        Self {
            stage,
            detail: detail.to_string(),
        }
    }

    /// The rejection this failure turns into
    pub fn into_update(self) -> StateUpdate {
        StateUpdate::new()
            .action(Action::Reject)
            .status(Status::Failed)
            .error(self.to_string())
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_error: {}", self.stage.error_tag(), self.detail)
    }
}

impl std::error::Error for StageFailure {}

/// Outcome of running one stage
pub type StageResult = std::result::Result<StateUpdate, StageFailure>;

/// Pick the stage that follows `stage`, given the merged state. `None` ends the turn.
pub fn next(stage: Stage, state: &ConversationState) -> Option<Stage> {
    let awaiting = state.status == Status::AwaitingUser;
    match stage {
        Stage::ConfirmReply => {
            if (awaiting && state.awaiting_confirmation) || state.is_declined() {
                Some(Stage::Respond)
            } else if state.confirmed && state.active_task().is_some() {
                Some(Stage::Route)
            } else {
                Some(Stage::Split)
            }
        }
        Stage::Split => Some(Stage::ConfirmGate),
        Stage::ConfirmGate => {
            if (awaiting && state.awaiting_confirmation) || state.action == Action::Reject {
                Some(Stage::Respond)
            } else {
                Some(Stage::Route)
            }
        }
        Stage::Route => {
            if state.error.is_some() {
                return Some(Stage::Respond);
            }
            match state.intent {
                Intent::PolicyQuery => Some(Stage::Retrieve),
                Intent::Incident | Intent::ServiceRequest => Some(Stage::Collect),
                Intent::General => Some(Stage::Respond),
            }
        }
        Stage::Retrieve => Some(Stage::Decide),
        Stage::Collect => {
            if state.error.is_some() {
                Some(Stage::Respond)
            } else {
                Some(Stage::Validate)
            }
        }
        Stage::Validate => Some(Stage::Decide),
        Stage::Decide => {
            if state.action == Action::CreateTicket {
                Some(Stage::Execute)
            } else {
                Some(Stage::Respond)
            }
        }
        Stage::Execute => Some(Stage::Respond),
        Stage::Respond => {
            if awaiting || state.is_declined() || state.action == Action::Reject {
                None
            } else {
                Some(Stage::Advance)
            }
        }
        Stage::Advance => {
            if state.status == Status::InProgress {
                Some(Stage::Route)
            } else {
                None
            }
        }
    }
}
