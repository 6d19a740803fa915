//! Evidence lookup for policy questions

use super::StageContext;
use crate::stage::StageResult;
use crate::state::{Action, ConversationState, StateUpdate, Status};

/// Retrieve policy evidence for the active task. Never fails: a missing
/// corpus or embedding fault simply leaves the lookup not found.
pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    let top_k = ctx.retriever.config().top_k;
    let evidence = ctx.retriever.retrieve(state.active_text(), top_k).await;

    tracing::debug!(
        "Thread {}: policy evidence score {:.3}, found={}",
        ctx.thread_id,
        evidence.score,
        evidence.found
    );

    Ok(StateUpdate::new()
        .evidence(evidence.context, evidence.score, evidence.found)
        .action(Action::Answer)
        .status(Status::ReadyForDecision))
}
