//! In-memory store implementations

use std::collections::HashMap;

use async_trait::async_trait;
use desk_ai::cosine_similarity;
use parking_lot::{Mutex, RwLock};

use super::{
    CacheEntry, CacheStore, CachedAnswer, Document, EvidenceStore, Passage, Sender, StateStore, Ticket,
    TicketChanges, TicketLedger, TicketMessage, TicketStore, best_cached,
};
use crate::error::Result;
use crate::state::{ConversationState, TicketPayload};

/// Evidence corpus held in memory
#[derive(Default)]
pub struct MemoryEvidenceStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryEvidenceStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    pub fn add(&self, document: Document) {
        self.documents.write().push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Passage>> {
        let documents = self.documents.read();
        let mut scored: Vec<Passage> = documents
            .iter()
            .filter(|d| d.embedding.len() == query.len())
            .map(|d| Passage {
                text: d.text.clone(),
                score: cosine_similarity(query, &d.embedding),
            })
            .filter(|p| p.score.is_finite())
            .collect();
        // stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Answer cache held in memory
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<Vec<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn lookup(&self, scope: &str, query: &[f32]) -> Result<Option<CachedAnswer>> {
        Ok(best_cached(self.entries.lock().iter(), scope, query))
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// Ticket store held in memory
#[derive(Default)]
pub struct MemoryTicketStore {
    ledger: Mutex<TicketLedger>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().is_empty()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(&self, user_id: &str, payload: &TicketPayload) -> Result<Ticket> {
        self.ledger.lock().create(user_id, payload)
    }

    async fn get(&self, id: &str) -> Result<Ticket> {
        self.ledger.lock().get(id)
    }

    async fn update_fields(&self, id: &str, changes: &TicketChanges) -> Result<Ticket> {
        self.ledger.lock().update_fields(id, changes)
    }

    async fn add_message(&self, id: &str, sender: Sender, content: &str) -> Result<TicketMessage> {
        self.ledger.lock().add_message(id, sender, content)
    }

    async fn assign(&self, id: &str, department: &str) -> Result<Ticket> {
        self.ledger.lock().assign(id, department)
    }

    async fn close(&self, id: &str) -> Result<Ticket> {
        self.ledger.lock().close(id)
    }

    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Ticket>> {
        Ok(self.ledger.lock().history(user_id, limit))
    }
}

/// Conversation checkpointer held in memory.
///
/// Snapshots are stored as JSON so a reload behaves like a durable store.
#[derive(Default)]
pub struct MemoryStateStore {
    snapshots: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let snapshots = self.snapshots.lock();
        match snapshots.get(thread_id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.snapshots.lock().insert(thread_id.to_string(), json);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
