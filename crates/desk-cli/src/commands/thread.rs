//! /thread and /new commands - switch conversation threads

use super::CommandResult;

pub struct ThreadCommand;

impl ThreadCommand {
    pub fn execute(args: &str, current: &str) -> CommandResult {
        if args.is_empty() {
            CommandResult::Message(format!("Current thread: {}", current))
        } else {
            CommandResult::SwitchThread(args.to_string())
        }
    }

    /// Switch to a thread named after the current time
    pub fn fresh() -> CommandResult {
        CommandResult::SwitchThread(new_thread_id())
    }
}

pub fn new_thread_id() -> String {
    chrono::Utc::now().format("t%Y%m%d-%H%M%S%3f").to_string()
}
