//! Slash commands for interactive mode

mod thread;
mod ticket;

pub use thread::ThreadCommand;
pub use ticket::TicketCommand;

use desk_flow::TicketStore;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the workflow)
    Message(String),
    /// Continue on another conversation thread
    SwitchThread(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// What commands may read and change
pub struct CommandContext<'a> {
    pub tickets: &'a dyn TicketStore,
    pub user_id: &'a str,
    pub thread_id: &'a str,
}

/// Parse and execute a slash command
pub async fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "thread" => ThreadCommand::execute(args, ctx.thread_id),

        "new" => ThreadCommand::fresh(),

        "ticket" | "t" => TicketCommand::show(args, ctx).await,

        "tickets" => TicketCommand::history(args, ctx).await,

        "close" => TicketCommand::close(args, ctx).await,

        "priority" => TicketCommand::priority(args, ctx).await,

        "note" => TicketCommand::note(args, ctx).await,

        "assign" => TicketCommand::assign(args, ctx).await,

        _ => CommandResult::Unknown(command),
    })
}

/// Split `"<id> <rest>"` into its two parts
fn id_and_rest(args: &str) -> Option<(&str, &str)> {
    let (id, rest) = args.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!id.is_empty() && !rest.is_empty()).then_some((id, rest))
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?             Show this help message
  /thread [id]              Show the current thread or switch to another
  /new                      Start a new thread
  /ticket, /t <id>          Show a ticket and its messages
  /tickets [n]              List your most recent tickets (default 3)
  /close <id>               Close a ticket
  /priority <id> <level>    Set priority (low, medium, high, urgent)
  /note <id> <text>         Add a message to a ticket
  /assign <id> <dept>       Move a ticket to HR, Finance, IT or Travel
  /quit, /exit, /q          Exit desk

Anything else is sent to the support desk."#
        .to_string()
}
