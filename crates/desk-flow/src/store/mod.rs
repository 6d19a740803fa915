//! Record store contracts consumed by the workflow

mod ledger;
pub mod memory;

pub use ledger::TicketLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use desk_ai::{Embedding, ServiceType, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::state::{ConversationState, TicketPayload};

/// Priorities a ticket may carry
pub const PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];

pub fn is_allowed_priority(priority: &str) -> bool {
    PRIORITIES.contains(&priority)
}

pub fn is_allowed_department(department: &str) -> bool {
    ServiceType::DEPARTMENTS
        .iter()
        .any(|d| d.as_str() == department)
}

/// A pre-embedded evidence passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub department: Option<String>,
    pub text: String,
    pub embedding: Embedding,
}

/// A scored search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f32,
}

/// Similarity search over a pre-populated corpus
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Up to `top_k` passages scored against `query`. Ranking is the caller's job.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Passage>>;
}

/// The closest previously answered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub query: String,
    pub answer: String,
    pub similarity: f32,
}

/// A remembered answer.
///
/// `scope` identifies the prompt and context the answer was generated under;
/// entries are only ever matched against lookups in the same scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub scope: String,
    pub embedding: Embedding,
    pub query: String,
    pub answer: String,
}

/// Best entry in `scope` by cosine similarity, skipping non-finite scores
pub fn best_cached<'a>(
    entries: impl IntoIterator<Item = &'a CacheEntry>,
    scope: &str,
    query: &[f32],
) -> Option<CachedAnswer> {
    let mut best: Option<CachedAnswer> = None;
    for entry in entries.into_iter().filter(|e| e.scope == scope) {
        let similarity = cosine_similarity(query, &entry.embedding);
        if !similarity.is_finite() {
            continue;
        }
        if best.as_ref().is_none_or(|b| similarity > b.similarity) {
            best = Some(CachedAnswer {
                query: entry.query.clone(),
                answer: entry.answer.clone(),
                similarity,
            });
        }
    }
    best
}

/// Storage for answers keyed by scope and query embedding
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Best match within `scope` by cosine similarity, if any entry exists
    async fn lookup(&self, scope: &str, query: &[f32]) -> Result<Option<CachedAnswer>>;

    async fn store(&self, entry: CacheEntry) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(Error::InvalidInput(format!("invalid status: {}", other))),
        }
    }
}

/// Author of a ticket message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
    System,
}

impl FromStr for Sender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "user" => Ok(Sender::User),
            "agent" => Ok(Sender::Agent),
            "system" => Ok(Sender::System),
            other => Err(Error::InvalidInput(format!("invalid sender: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub user_id: String,
    pub department: String,
    pub description: String,
    pub priority: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
}

/// Field changes accepted by [`TicketStore::update_fields`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketChanges {
    pub priority: Option<String>,
    pub status: Option<TicketStatus>,
}

/// Durable ticket records
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, user_id: &str, payload: &TicketPayload) -> Result<Ticket>;

    /// A ticket with its messages
    async fn get(&self, id: &str) -> Result<Ticket>;

    async fn update_fields(&self, id: &str, changes: &TicketChanges) -> Result<Ticket>;

    async fn add_message(&self, id: &str, sender: Sender, content: &str) -> Result<TicketMessage>;

    async fn assign(&self, id: &str, department: &str) -> Result<Ticket>;

    async fn close(&self, id: &str) -> Result<Ticket>;

    /// A user's most recent tickets, newest first
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Ticket>>;
}

/// Checkpointer for conversation state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>>;

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()>;

    /// Known thread ids
    async fn list(&self) -> Result<Vec<String>>;
}
