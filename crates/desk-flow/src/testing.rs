//! Scripted collaborators shared by the unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use desk_ai::{
    AnswerGenerator, AnswerRequest, Classification, Classifier, Embedder, Embedding, Intent,
    ServiceType, SplitTask, TaskDecomposer,
};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::engine::{Collaborators, Engine};
use crate::error::{Error, Result};
use crate::state::TicketPayload;
use crate::store::memory::{
    MemoryCacheStore, MemoryEvidenceStore, MemoryStateStore, MemoryTicketStore,
};
use crate::store::{
    CacheEntry, CacheStore, CachedAnswer, Document, EvidenceStore, Passage, Sender, Ticket, TicketChanges,
    TicketMessage, TicketStore,
};

const DIMENSION: usize = 64;

fn offline(what: &str) -> desk_ai::Error {
    desk_ai::Error::Timeout(format!("{} offline", what))
}

/// Deterministic bag-of-words embedder
#[derive(Default)]
pub struct FakeEmbedder {
    fail: bool,
    calls: AtomicU32,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// FNV-1a hash of each lowercase token, folded into a fixed dimension
    pub fn vector(text: &str) -> Embedding {
        let mut vector = vec![0.0; DIMENSION];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }

    pub fn document(&self, text: &str) -> Document {
        Document {
            department: None,
            text: text.to_string(),
            embedding: Self::vector(text),
        }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> desk_ai::Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(offline("embedder"));
        }
        Ok(Self::vector(text))
    }
}

pub struct FailingEvidenceStore;

#[async_trait]
impl EvidenceStore for FailingEvidenceStore {
    async fn search(&self, _query: &[f32], _top_k: usize) -> Result<Vec<Passage>> {
        Err(Error::Store("evidence store offline".into()))
    }
}

/// Cache whose best match always has the given similarity
pub struct FixedCacheStore {
    similarity: f32,
    answer: String,
}

impl FixedCacheStore {
    pub fn new(similarity: f32, answer: &str) -> Self {
        Self {
            similarity,
            answer: answer.to_string(),
        }
    }
}

#[async_trait]
impl CacheStore for FixedCacheStore {
    async fn lookup(&self, _scope: &str, _query: &[f32]) -> Result<Option<CachedAnswer>> {
        Ok(Some(CachedAnswer {
            query: String::new(),
            answer: self.answer.clone(),
            similarity: self.similarity,
        }))
    }

    async fn store(&self, _entry: CacheEntry) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct ScriptedClassifier {
    result: Mutex<Option<Classification>>,
    fail: Mutex<bool>,
    calls: AtomicU32,
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> desk_ai::Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(offline("classifier"));
        }
        Ok(self.result.lock().clone().unwrap_or(Classification {
            intent: Intent::General,
            service_type: ServiceType::General,
            confidence: 0.9,
        }))
    }
}

/// Returns queued splits in order; once exhausted, wraps the text in one general task
#[derive(Default)]
pub struct ScriptedDecomposer {
    scripts: Mutex<VecDeque<Vec<SplitTask>>>,
    fail: Mutex<bool>,
    calls: AtomicU32,
}

#[async_trait]
impl TaskDecomposer for ScriptedDecomposer {
    async fn split(&self, text: &str) -> desk_ai::Result<Vec<SplitTask>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(offline("decomposer"));
        }
        Ok(self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| vec![SplitTask::new(text, Intent::General, ServiceType::General)]))
    }
}

#[derive(Default)]
pub struct ScriptedAnswerer {
    answer: Mutex<Option<String>>,
    fail: Mutex<bool>,
    calls: AtomicU32,
    last: Mutex<Option<AnswerRequest>>,
}

#[async_trait]
impl AnswerGenerator for ScriptedAnswerer {
    async fn answer(&self, request: &AnswerRequest) -> desk_ai::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(request.clone());
        if *self.fail.lock() {
            return Err(offline("answerer"));
        }
        Ok(self
            .answer
            .lock()
            .clone()
            .unwrap_or_else(|| "Happy to help.".to_string()))
    }
}

pub struct FailingTicketStore;

#[async_trait]
impl TicketStore for FailingTicketStore {
    async fn create(&self, _user_id: &str, _payload: &TicketPayload) -> Result<Ticket> {
        Err(Error::Store("ticket store offline".into()))
    }

    async fn get(&self, id: &str) -> Result<Ticket> {
        Err(Error::NotFound(id.to_string()))
    }

    async fn update_fields(&self, id: &str, _changes: &TicketChanges) -> Result<Ticket> {
        Err(Error::NotFound(id.to_string()))
    }

    async fn add_message(&self, id: &str, _sender: Sender, _content: &str) -> Result<TicketMessage> {
        Err(Error::NotFound(id.to_string()))
    }

    async fn assign(&self, id: &str, _department: &str) -> Result<Ticket> {
        Err(Error::NotFound(id.to_string()))
    }

    async fn close(&self, id: &str) -> Result<Ticket> {
        Err(Error::NotFound(id.to_string()))
    }

    async fn history(&self, _user_id: &str, _limit: usize) -> Result<Vec<Ticket>> {
        Ok(Vec::new())
    }
}

/// A full set of fake collaborators with in-memory stores
pub struct Fakes {
    pub classifier: Arc<ScriptedClassifier>,
    pub decomposer: Arc<ScriptedDecomposer>,
    pub answerer: Arc<ScriptedAnswerer>,
    pub embedder: Arc<FakeEmbedder>,
    pub evidence: Arc<MemoryEvidenceStore>,
    pub cache: Arc<MemoryCacheStore>,
    pub tickets: Arc<MemoryTicketStore>,
    pub states: Arc<MemoryStateStore>,
    failing_tickets: bool,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            classifier: Arc::default(),
            decomposer: Arc::default(),
            answerer: Arc::default(),
            embedder: Arc::default(),
            evidence: Arc::default(),
            cache: Arc::default(),
            tickets: Arc::default(),
            states: Arc::default(),
            failing_tickets: false,
        }
    }

    /// Queue one decomposer result; repeated calls queue results for later turns
    pub fn with_split(self, tasks: Vec<SplitTask>) -> Self {
        self.decomposer.scripts.lock().push_back(tasks);
        self
    }

    pub fn with_split_error(self) -> Self {
        *self.decomposer.fail.lock() = true;
        self
    }

    pub fn with_classification(self, classification: Classification) -> Self {
        *self.classifier.result.lock() = Some(classification);
        self
    }

    pub fn with_classify_error(self) -> Self {
        *self.classifier.fail.lock() = true;
        self
    }

    pub fn with_answer(self, answer: &str) -> Self {
        *self.answerer.answer.lock() = Some(answer.to_string());
        self
    }

    pub fn with_answer_error(self) -> Self {
        *self.answerer.fail.lock() = true;
        self
    }

    pub fn with_corpus(self, passages: &[&str]) -> Self {
        for text in passages {
            self.evidence.add(self.embedder.document(text));
        }
        self
    }

    pub fn with_failing_tickets(mut self) -> Self {
        self.failing_tickets = true;
        self
    }

    pub fn split_calls(&self) -> u32 {
        self.decomposer.calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> u32 {
        self.classifier.calls.load(Ordering::SeqCst)
    }

    pub fn answer_calls(&self) -> u32 {
        self.answerer.calls.load(Ordering::SeqCst)
    }

    pub fn last_answer_request(&self) -> Option<AnswerRequest> {
        self.answerer.last.lock().clone()
    }

    pub fn collaborators(&self) -> Collaborators {
        let tickets: Arc<dyn TicketStore> = if self.failing_tickets {
            Arc::new(FailingTicketStore)
        } else {
            self.tickets.clone()
        };
        Collaborators {
            classifier: self.classifier.clone(),
            decomposer: self.decomposer.clone(),
            answerer: self.answerer.clone(),
            embedder: self.embedder.clone(),
            evidence: self.evidence.clone(),
            cache: self.cache.clone(),
            tickets,
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> Engine {
        Engine::new(self.collaborators(), self.states.clone(), config)
    }
}
