//! Shared utilities

use desk_flow::{ConversationState, Ticket};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// One line per ticket, for listings
pub fn format_ticket_line(ticket: &Ticket) -> String {
    format!(
        "  {}  {:<8} {:<8} {:<11} {}",
        ticket.id,
        ticket.department,
        ticket.priority,
        ticket.status.as_str(),
        truncate_chars(&ticket.description, 48)
    )
}

/// A ticket with its messages
pub fn format_ticket(ticket: &Ticket) -> String {
    let mut output = format!(
        "Ticket {}\nDepartment: {}\nPriority: {}\nStatus: {}\nCreated: {}\nDescription: {}",
        ticket.id,
        ticket.department,
        ticket.priority,
        ticket.status,
        ticket.created_at.format("%Y-%m-%d %H:%M"),
        ticket.description
    );
    for message in &ticket.messages {
        output.push_str(&format!(
            "\n  [{}] {:?}: {}",
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.sender,
            message.content
        ));
    }
    output
}

/// What a caller shows after a turn: the reply, the ticket block and any policy context
pub fn render_turn(state: &ConversationState) -> String {
    let mut output = state.last_reply().unwrap_or_default().to_string();

    if let (Some(id), Some(payload)) = (&state.ticket_id, &state.ticket_payload) {
        // the reply already is the ticket summary when the ticket was just created
        if !output.contains(id.as_str()) {
            output.push_str(&format!(
                "\n\n[ticket {} | {} | {}]",
                id, payload.department, payload.priority
            ));
        }
    }

    if !state.rag_context.trim().is_empty() {
        output.push_str("\n\nPolicy context:\n");
        output.push_str(&truncate_chars(state.rag_context.trim(), 600));
    }
    output
}
