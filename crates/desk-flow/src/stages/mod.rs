//! The processing stages of a turn.
//!
//! Every stage reads the merged state and returns either a partial update or a
//! [`StageFailure`]; none of them mutate state or let a collaborator fault escape.

pub mod confirmation;
pub mod decision;
pub mod execution;
pub mod metadata;
pub mod policy;
pub mod progress;
pub mod response;
pub mod router;
pub mod splitter;
pub mod validation;

use desk_ai::{AnswerGenerator, Classifier, TaskDecomposer};
use tokio::sync::broadcast;

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::events::FlowEvent;
use crate::retrieval::EvidenceRetriever;
use crate::stage::{Stage, StageFailure, StageResult};
use crate::state::ConversationState;
use crate::store::TicketStore;

/// Everything a stage may consult while it runs
pub struct StageContext<'a> {
    pub thread_id: &'a str,
    pub user_id: &'a str,
    pub config: &'a EngineConfig,
    pub classifier: &'a dyn Classifier,
    pub decomposer: &'a dyn TaskDecomposer,
    pub answerer: &'a dyn AnswerGenerator,
    pub tickets: &'a dyn TicketStore,
    pub retriever: &'a EvidenceRetriever,
    pub cache: &'a ResultCache,
    pub events: &'a broadcast::Sender<FlowEvent>,
}

impl StageContext<'_> {
    /// Fire-and-forget event emission
    pub fn emit(&self, event: FlowEvent) {
        let _ = self.events.send(event);
    }
}

/// Run one stage against the current state
pub async fn run(stage: Stage, ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    match stage {
        Stage::ConfirmReply | Stage::ConfirmGate => confirmation::run(ctx, state),
        Stage::Split => splitter::run(ctx, state).await,
        Stage::Route => router::run(ctx, state).await,
        Stage::Retrieve => policy::run(ctx, state).await,
        Stage::Collect => metadata::run(state),
        Stage::Validate => validation::run(ctx, state).await,
        Stage::Decide => decision::run(state),
        Stage::Execute => execution::run(ctx, state).await,
        Stage::Respond => response::run(ctx, state).await,
        Stage::Advance => progress::run(state),
    }
}

/// Convert a collaborator error into this stage's failure
pub(crate) fn fail(stage: Stage) -> impl FnOnce(desk_ai::Error) -> StageFailure {
    move |e| StageFailure::new(stage, e)
}
