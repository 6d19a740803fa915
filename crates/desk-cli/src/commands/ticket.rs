//! Ticket maintenance commands

use super::{CommandContext, CommandResult, id_and_rest};
use crate::utils::{format_ticket, format_ticket_line};
use desk_flow::store::{PRIORITIES, Sender};
use desk_flow::TicketChanges;

const DEFAULT_HISTORY: usize = 3;

pub struct TicketCommand;

impl TicketCommand {
    /// /ticket <id>
    pub async fn show(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return usage("/ticket <id>");
        }
        match ctx.tickets.get(args).await {
            Ok(ticket) => CommandResult::Message(format_ticket(&ticket)),
            Err(e) => failed(e),
        }
    }

    /// /tickets [n]
    pub async fn history(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let limit = if args.is_empty() {
            DEFAULT_HISTORY
        } else {
            match args.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return usage("/tickets [n]"),
            }
        };

        match ctx.tickets.history(ctx.user_id, limit).await {
            Ok(tickets) if tickets.is_empty() => {
                CommandResult::Message(format!("No tickets for {}.", ctx.user_id))
            }
            Ok(tickets) => {
                let lines: Vec<String> = tickets.iter().map(format_ticket_line).collect();
                CommandResult::Message(format!(
                    "Recent tickets for {}:\n{}",
                    ctx.user_id,
                    lines.join("\n")
                ))
            }
            Err(e) => failed(e),
        }
    }

    /// /close <id>
    pub async fn close(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return usage("/close <id>");
        }
        match ctx.tickets.close(args).await {
            Ok(ticket) => CommandResult::Message(format!("Closed ticket {}.", ticket.id)),
            Err(e) => failed(e),
        }
    }

    /// /priority <id> <level>
    pub async fn priority(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let Some((id, level)) = id_and_rest(args) else {
            return usage(&format!("/priority <id> <{}>", PRIORITIES.join("|")));
        };
        let changes = TicketChanges {
            priority: Some(level.to_lowercase()),
            status: None,
        };
        match ctx.tickets.update_fields(id, &changes).await {
            Ok(ticket) => CommandResult::Message(format!(
                "Ticket {} priority is now {}.",
                ticket.id, ticket.priority
            )),
            Err(e) => failed(e),
        }
    }

    /// /note <id> <text>
    pub async fn note(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let Some((id, text)) = id_and_rest(args) else {
            return usage("/note <id> <text>");
        };
        match ctx.tickets.add_message(id, Sender::User, text).await {
            Ok(_) => CommandResult::Message(format!("Added a note to ticket {}.", id)),
            Err(e) => failed(e),
        }
    }

    /// /assign <id> <department>
    pub async fn assign(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let Some((id, department)) = id_and_rest(args) else {
            return usage("/assign <id> <HR|Finance|IT|Travel>");
        };
        match ctx.tickets.assign(id, department).await {
            Ok(ticket) => CommandResult::Message(format!(
                "Ticket {} assigned to {}.",
                ticket.id, ticket.department
            )),
            Err(e) => failed(e),
        }
    }
}

fn usage(form: &str) -> CommandResult {
    CommandResult::Message(format!("Usage: {}", form))
}

fn failed(error: desk_flow::Error) -> CommandResult {
    CommandResult::Message(format!("Error: {}", error))
}
