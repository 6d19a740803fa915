//! Checks collected fields before a ticket can be created

use desk_ai::Intent;

use super::StageContext;
use crate::stage::StageResult;
use crate::state::{ConversationState, Field, StateUpdate, Status};
use crate::store::{is_allowed_department, is_allowed_priority};

pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    if !state.intent.requires_ticket() {
        return Ok(StateUpdate::new()
            .validation_passed(true)
            .status(Status::Validated));
    }

    // Missing fields pause the turn; they are not a failure.
    if !state.missing_fields.is_empty() {
        return Ok(StateUpdate::new()
            .validation_passed(false)
            .status(Status::AwaitingUser));
    }

    let department = state.field(Field::Department).unwrap_or_default();
    let priority = state
        .field(Field::Priority)
        .unwrap_or_default()
        .to_lowercase();
    let description = state.field(Field::Description).unwrap_or_default();

    let violation = if !is_allowed_department(department) {
        Some(format!("invalid_department: {}", department))
    } else if !is_allowed_priority(&priority) {
        Some(format!("invalid_priority: {}", priority))
    } else if description.is_empty() {
        Some("invalid_description".to_string())
    } else {
        None
    };

    if let Some(error) = violation {
        tracing::debug!("Thread {}: validation failed: {}", ctx.thread_id, error);
        return Ok(StateUpdate::new()
            .validation_passed(false)
            .status(Status::Failed)
            .error(error));
    }

    let mut update = StateUpdate::new()
        .validation_passed(true)
        .status(Status::Validated);

    if state.intent == Intent::ServiceRequest {
        let query = format!("{} request policy: {}", department, description);
        let evidence = ctx
            .retriever
            .retrieve(&query, ctx.config.validation_top_k)
            .await;
        if evidence.found && !evidence.context.is_empty() {
            let context = if state.rag_context.is_empty() {
                evidence.context
            } else {
                format!("{}\n\n{}", state.rag_context, evidence.context)
            };
            update = update.evidence(context, state.rag_score.max(evidence.score), true);
        }
    }

    Ok(update)
}
