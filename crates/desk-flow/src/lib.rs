//! desk-flow: Resumable workflow engine for enterprise support requests
//!
//! This crate turns one user utterance at a time into answers and tickets. A
//! turn splits the utterance into tasks, asks for confirmation before creating
//! several tickets, routes each task, collects and validates ticket fields and
//! either answers from retrieved evidence or files a ticket. State is persisted
//! per thread so a turn that stops to ask the user resumes on the next one.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod retrieval;
pub mod stage;
pub mod stages;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use cache::{CachedReply, ResultCache};
pub use config::{CacheConfig, DeclinePolicy, EngineConfig, RetrievalConfig};
pub use engine::{Collaborators, Engine};
pub use error::{Error, Result};
pub use events::FlowEvent;
pub use retrieval::{Evidence, EvidenceRetriever};
pub use stage::{Stage, StageFailure};
pub use state::{
    Action, ConversationState, Field, StateUpdate, Status, Task, TaskStatus, TicketPayload,
    TurnInput,
};
pub use store::{
    CacheEntry, CacheStore, EvidenceStore, StateStore, Ticket, TicketChanges, TicketLedger, TicketStatus,
    TicketStore,
};
