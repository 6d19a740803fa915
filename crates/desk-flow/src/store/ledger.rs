//! Ticket bookkeeping shared by the in-memory and file-backed ticket stores

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    Sender, Ticket, TicketChanges, TicketMessage, TicketStatus, is_allowed_department,
    is_allowed_priority,
};
use crate::error::{Error, Result};
use crate::state::TicketPayload;

/// All tickets, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketLedger {
    tickets: Vec<Ticket>,
}

impl TicketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn create(&mut self, user_id: &str, payload: &TicketPayload) -> Result<Ticket> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user_id missing".into()));
        }
        if !is_allowed_department(&payload.department) {
            return Err(Error::InvalidInput(format!(
                "invalid department: {}",
                payload.department
            )));
        }
        if !is_allowed_priority(&payload.priority) {
            return Err(Error::InvalidInput(format!(
                "invalid priority: {}",
                payload.priority
            )));
        }

        let now = Utc::now();
        let ticket = Ticket {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            department: payload.department.clone(),
            description: payload.description.clone(),
            priority: payload.priority.clone(),
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        self.tickets.push(ticket.clone());
        Ok(ticket)
    }

    pub fn get(&self, id: &str) -> Result<Ticket> {
        self.tickets
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Ticket> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn update_fields(&mut self, id: &str, changes: &TicketChanges) -> Result<Ticket> {
        if changes.priority.is_none() && changes.status.is_none() {
            return Err(Error::InvalidInput("no fields to update".into()));
        }
        if let Some(priority) = &changes.priority {
            if !is_allowed_priority(priority) {
                return Err(Error::InvalidInput(format!("invalid priority: {}", priority)));
            }
        }

        let ticket = self.get_mut(id)?;
        if let Some(priority) = &changes.priority {
            ticket.priority = priority.clone();
        }
        if let Some(status) = changes.status {
            ticket.status = status;
        }
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    pub fn add_message(&mut self, id: &str, sender: Sender, content: &str) -> Result<TicketMessage> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("empty message".into()));
        }
        let ticket = self.get_mut(id)?;
        let message = TicketMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        ticket.messages.push(message.clone());
        ticket.updated_at = message.created_at;
        Ok(message)
    }

    pub fn assign(&mut self, id: &str, department: &str) -> Result<Ticket> {
        if !is_allowed_department(department) {
            return Err(Error::InvalidInput(format!(
                "invalid department: {}",
                department
            )));
        }
        let ticket = self.get_mut(id)?;
        ticket.department = department.to_string();
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    pub fn close(&mut self, id: &str) -> Result<Ticket> {
        let ticket = self.get_mut(id)?;
        ticket.status = TicketStatus::Closed;
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    pub fn history(&self, user_id: &str, limit: usize) -> Vec<Ticket> {
        self.tickets
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }
}

fn not_found(id: &str) -> Error {
    Error::NotFound(format!("ticket {}", id))
}
