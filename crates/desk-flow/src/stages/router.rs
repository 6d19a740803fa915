//! Classifies the active task

use desk_ai::{Intent, ServiceType};

use super::{StageContext, fail};
use crate::stage::{Stage, StageResult};
use crate::state::{Action, ConversationState, StateUpdate, Status};

pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    if state.user_query.trim().is_empty() && state.active_text().trim().is_empty() {
        return Ok(general());
    }

    // A queued task already carries its classification.
    if let Some(task) = state.active_task() {
        return Ok(adopt(task.intent, task.service_type));
    }
    if state.status == Status::AwaitingUser {
        return Ok(adopt(state.intent, state.service_type));
    }

    let text = state.active_text();
    let classification = ctx.classifier.classify(text).await.map_err(fail(Stage::Route))?;

    // Written so a NaN confidence also falls back.
    if !(classification.confidence >= ctx.config.router_confidence_floor) {
        tracing::debug!(
            "Thread {}: low routing confidence {:.2}, answering as general",
            ctx.thread_id,
            classification.confidence
        );
        return Ok(general());
    }

    Ok(StateUpdate::new()
        .classification(classification.intent, classification.service_type)
        .action(Action::None)
        .status(Status::InProgress)
        .clear_error())
}

fn general() -> StateUpdate {
    StateUpdate::new()
        .classification(Intent::General, ServiceType::General)
        .action(Action::Answer)
        .status(Status::ReadyForDecision)
}

fn adopt(intent: Intent, service_type: ServiceType) -> StateUpdate {
    StateUpdate::new()
        .classification(intent, service_type)
        .status(Status::InProgress)
        .clear_error()
}
