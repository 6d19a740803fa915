//! Turns a fresh utterance into a task queue

use desk_ai::{Intent, ServiceType};

use super::StageContext;
use crate::stage::StageResult;
use crate::state::{ConversationState, StateUpdate, Status, Task};

pub async fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    let query = state.user_query.trim();
    let continuation = state.status == Status::AwaitingUser && !state.tasks.is_empty();

    // Mid-queue turns keep their queue; only the raw query is normalized.
    if continuation || state.active_task().is_some() {
        return Ok(StateUpdate::new().user_query(query));
    }

    if query.is_empty() {
        return Ok(fresh_queue(vec![Task::pending("", Intent::General, ServiceType::General)]));
    }

    let tasks: Vec<Task> = match ctx.decomposer.split(query).await {
        Ok(split) => split
            .into_iter()
            .filter(|t| !t.sub_query.trim().is_empty())
            .map(Task::from)
            .collect(),
        Err(e) => {
            tracing::warn!("Thread {}: decomposition failed, keeping one task: {}", ctx.thread_id, e);
            Vec::new()
        }
    };

    if tasks.is_empty() {
        return Ok(fresh_queue(vec![Task::pending(query, Intent::General, ServiceType::General)]));
    }

    tracing::debug!("Thread {}: split into {} tasks", ctx.thread_id, tasks.len());
    Ok(fresh_queue(tasks).user_query(query))
}

/// Install a new queue, asking for confirmation when more than one task will create tickets
fn fresh_queue(tasks: Vec<Task>) -> StateUpdate {
    let needs_confirmation = tasks.len() > 1 && tasks.iter().any(|t| t.intent.requires_ticket());
    StateUpdate::new()
        .tasks(tasks)
        .current_task_index(0)
        .confirmed(false)
        .awaiting_confirmation(needs_confirmation)
        .confirmation_prompt(None)
        .status(Status::InProgress)
        .clear_error()
}
