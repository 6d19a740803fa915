//! Composes the one assistant reply a turn appends

use desk_ai::{AnswerRequest, Intent, Message};

use super::{StageContext, fail};
use crate::events::FlowEvent;
use crate::stage::{Stage, StageFailure, StageResult};
use crate::state::{Action, ConversationState, StateUpdate, Status};

pub const POLICY_SYSTEM_PROMPT: &str = "You are an enterprise support assistant. Answer strictly from policy context. If insufficient context, respond exactly: I don't know";

pub const GENERAL_SYSTEM_PROMPT: &str = "Provide a concise, professional enterprise support response.";

pub const NOT_FOUND_REPLY: &str = "I don't know";
pub const DECLINED_REPLY: &str = "Understood. No tickets were created.";
pub const GREETING_REPLY: &str = "How can I help you today?";
const MISSING_FIELDS_REPLY: &str = "I need additional details before I can proceed.";

/// Status a turn settles on once the reply is composed
pub fn final_status(state: &ConversationState) -> Status {
    match state.status {
        Status::AwaitingUser => Status::AwaitingUser,
        Status::Failed => Status::Failed,
        _ => Status::Completed,
    }
}

pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    let text = compose(ctx, state).await?;
    Ok(StateUpdate::new()
        .message(Message::assistant(text))
        .status(final_status(state)))
}

async fn compose(ctx: &StageContext<'_>, state: &ConversationState) -> Result<String, StageFailure> {
    if let Some(prompt) = &state.confirmation_prompt {
        if state.status == Status::AwaitingUser {
            return Ok(prompt.clone());
        }
    }
    if state.is_declined() {
        return Ok(DECLINED_REPLY.to_string());
    }

    match state.action {
        Action::Reject => {
            return Ok(format!(
                "Request rejected. Reason: {}",
                state.error.as_deref().unwrap_or("validation failed")
            ));
        }
        Action::AskUser => {
            if state.missing_fields.is_empty() {
                return Ok(MISSING_FIELDS_REPLY.to_string());
            }
            let names: Vec<&str> = state.missing_fields.iter().map(|f| f.as_str()).collect();
            return Ok(format!("{}\nMissing fields: {}", MISSING_FIELDS_REPLY, names.join(", ")));
        }
        Action::CreateTicket => {
            if let (Some(id), Some(payload)) = (&state.ticket_id, &state.ticket_payload) {
                return Ok(format!(
                    "Ticket Created\nID: {}\nDepartment: {}\nPriority: {}\nStatus: open",
                    id, payload.department, payload.priority
                ));
            }
        }
        Action::Answer if state.intent == Intent::PolicyQuery => {
            if !state.rag_found || state.rag_context.trim().is_empty() {
                return Ok(NOT_FOUND_REPLY.to_string());
            }
            let request = AnswerRequest::new(POLICY_SYSTEM_PROMPT, state.active_text())
                .with_context(state.rag_context.as_str());
            return answer(ctx, &request).await;
        }
        _ => {}
    }

    let query = state.active_text().trim();
    if query.is_empty() {
        return Ok(GREETING_REPLY.to_string());
    }
    answer(ctx, &AnswerRequest::new(GENERAL_SYSTEM_PROMPT, query)).await
}

/// Generate through the result cache
async fn answer(ctx: &StageContext<'_>, request: &AnswerRequest) -> Result<String, StageFailure> {
    let reply = ctx
        .cache
        .get_or_generate(request, || ctx.answerer.answer(request))
        .await
        .map_err(fail(Stage::Respond))?;

    if let Some(similarity) = reply.hit {
        ctx.emit(FlowEvent::CacheHit {
            thread_id: ctx.thread_id.to_string(),
            similarity,
        });
    }

    let text = reply.text.trim();
    if text.is_empty() {
        Ok(NOT_FOUND_REPLY.to_string())
    } else {
        Ok(text.to_string())
    }
}
