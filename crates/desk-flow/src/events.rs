//! Flow event types

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::state::Status;

/// Events emitted while the engine runs a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A turn started on a thread
    TurnStart { thread_id: String },

    /// A stage is about to run
    StageStart { thread_id: String, stage: Stage },

    /// A stage finished and its update was merged
    StageEnd {
        thread_id: String,
        stage: Stage,
        status: Status,
    },

    /// The ticket store accepted a new ticket
    TicketCreated {
        thread_id: String,
        ticket_id: String,
        department: String,
        priority: String,
    },

    /// A previous answer was reused
    CacheHit { thread_id: String, similarity: f32 },

    /// The turn stopped to wait for the user
    Suspended { thread_id: String },

    /// A stage failed and was converted into a rejection
    Error {
        thread_id: String,
        stage: Stage,
        message: String,
    },

    /// The turn finished and the state was persisted
    TurnEnd { thread_id: String, status: Status },
}

impl FlowEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowEvent::TurnEnd { .. })
    }

    pub fn thread_id(&self) -> &str {
        match self {
            FlowEvent::TurnStart { thread_id }
            | FlowEvent::StageStart { thread_id, .. }
            | FlowEvent::StageEnd { thread_id, .. }
            | FlowEvent::TicketCreated { thread_id, .. }
            | FlowEvent::CacheHit { thread_id, .. }
            | FlowEvent::Suspended { thread_id }
            | FlowEvent::Error { thread_id, .. }
            | FlowEvent::TurnEnd { thread_id, .. } => thread_id,
        }
    }
}
