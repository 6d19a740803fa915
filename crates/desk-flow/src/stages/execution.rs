//! Creates the ticket for the active task

use super::StageContext;
use crate::events::FlowEvent;
use crate::stage::{Stage, StageFailure, StageResult};
use crate::state::{Action, ConversationState, Field, StateUpdate, Status, TicketPayload};

use super::metadata::DEFAULT_PRIORITY;

/// The payload a ticket is created from
pub fn payload(state: &ConversationState) -> TicketPayload {
    TicketPayload {
        department: state.field(Field::Department).unwrap_or_default().to_string(),
        description: state.field(Field::Description).unwrap_or_default().to_string(),
        priority: state
            .field(Field::Priority)
            .unwrap_or(DEFAULT_PRIORITY)
            .to_lowercase(),
    }
}

pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    if state.action != Action::CreateTicket {
        return Ok(StateUpdate::new());
    }

    let payload = payload(state);
    let ticket = ctx
        .tickets
        .create(ctx.user_id, &payload)
        .await
        .map_err(|e| StageFailure::new(Stage::Execute, e))?;

    tracing::info!(
        "Thread {}: created ticket {} ({}, {})",
        ctx.thread_id,
        ticket.id,
        payload.department,
        payload.priority
    );
    ctx.emit(FlowEvent::TicketCreated {
        thread_id: ctx.thread_id.to_string(),
        ticket_id: ticket.id.clone(),
        department: payload.department.clone(),
        priority: payload.priority.clone(),
    });

    Ok(StateUpdate::new()
        .ticket(ticket.id, payload)
        .status(Status::Executed)
        .clear_error())
}
