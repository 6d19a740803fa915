//! Confirmation gate for side-effecting multi-task batches

use desk_ai::{Intent, ServiceType};

use super::StageContext;
use crate::config::DeclinePolicy;
use crate::stage::StageResult;
use crate::state::{Action, ConversationState, DECLINED_TAG, StateUpdate, Status, Task};

const YES: [&str; 6] = ["yes", "y", "yeah", "yep", "confirm", "proceed"];
const NO: [&str; 5] = ["no", "n", "nope", "cancel", "stop"];

/// How a reply to the confirmation prompt reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
    Ambiguous,
}

pub fn interpret(text: &str) -> Reply {
    let reply = text.trim().to_lowercase();
    if YES.contains(&reply.as_str()) {
        Reply::Yes
    } else if NO.contains(&reply.as_str()) {
        Reply::No
    } else {
        Reply::Ambiguous
    }
}

/// The numbered confirmation prompt for a task queue
pub fn render_prompt(tasks: &[Task]) -> String {
    let lines = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {}", i + 1, t.intent, t.sub_query))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "I detected multiple requests:\n\n{}\n\nDo you want me to proceed with creating separate tickets? (yes/no)",
        lines
    )
}

pub fn run(ctx: &StageContext<'_>, state: &ConversationState) -> StageResult {
    if !state.awaiting_confirmation {
        return Ok(StateUpdate::new());
    }
    if state.confirmed {
        return Ok(StateUpdate::new().awaiting_confirmation(false));
    }
    if state.confirmation_prompt.is_none() {
        return Ok(ask(state));
    }

    match interpret(&state.user_query) {
        Reply::Yes => {
            tracing::info!("Thread {}: user confirmed {} tasks", ctx.thread_id, state.tasks.len());
            Ok(StateUpdate::new()
                .awaiting_confirmation(false)
                .confirmed(true)
                .confirmation_prompt(None)
                .action(Action::None)
                .status(Status::InProgress)
                .clear_error())
        }
        Reply::No => {
            tracing::info!("Thread {}: user declined {} tasks", ctx.thread_id, state.tasks.len());
            Ok(declined(ctx.config.decline_policy))
        }
        Reply::Ambiguous => Ok(ask(state)),
    }
}

fn ask(state: &ConversationState) -> StateUpdate {
    StateUpdate::new()
        .confirmation_prompt(Some(render_prompt(&state.tasks)))
        .action(Action::AskUser)
        .status(Status::AwaitingUser)
}

fn declined(policy: DeclinePolicy) -> StateUpdate {
    let update = match policy {
        DeclinePolicy::ClearQueue => StateUpdate::new(),
        DeclinePolicy::ResetTask => StateUpdate::reset_task()
            .current_task_index(0)
            .classification(Intent::General, ServiceType::General),
    };
    update
        .tasks(Vec::new())
        .awaiting_confirmation(false)
        .confirmed(false)
        .confirmation_prompt(None)
        .action(Action::Answer)
        .status(Status::Completed)
        .error(DECLINED_TAG)
}
