//! Advances the task queue after a task's reply

use crate::stage::StageResult;
use crate::state::{ConversationState, StateUpdate, Status, TaskStatus};

pub fn run(state: &ConversationState) -> StageResult {
    if state.tasks.is_empty() {
        return Ok(StateUpdate::new().status(Status::Completed));
    }

    let mut tasks = state.tasks.clone();
    let index = state.current_task_index;
    if let Some(task) = tasks.get_mut(index) {
        task.status = TaskStatus::Completed;
    }

    let next = index.saturating_add(1);
    if next >= tasks.len() {
        let exhausted = tasks.len();
        return Ok(StateUpdate::new()
            .tasks(tasks)
            .current_task_index(exhausted)
            .status(Status::Completed));
    }

    tracing::debug!("Advancing to task {} of {}", next + 1, tasks.len());
    Ok(StateUpdate::reset_task()
        .tasks(tasks)
        .current_task_index(next)
        .status(Status::InProgress))
}
