//! File-backed conversation, ticket and answer-cache stores

use async_trait::async_trait;
use desk_flow::store::{CachedAnswer, Sender, TicketMessage, best_cached};
use desk_flow::{
    CacheEntry, CacheStore, ConversationState, Error, Result, StateStore, Ticket, TicketChanges,
    TicketLedger, TicketPayload, TicketStore,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Oldest cache entries are dropped beyond this many
const MAX_CACHE_ENTRIES: usize = 2000;

/// Write `value` as pretty JSON, then rename over `path` so a crash never leaves a torn file
async fn persist<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn check_thread_id(thread_id: &str) -> Result<()> {
    let valid = !thread_id.is_empty()
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !thread_id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid thread id: {}", thread_id)))
    }
}

/// One JSON document per thread under `<data_dir>/threads/`
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("threads");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, thread_id: &str) -> Result<PathBuf> {
        check_thread_id(thread_id)?;
        Ok(self.dir.join(format!("{}.json", thread_id)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let path = self.path(thread_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        persist(&self.path(thread_id)?, state).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut threads = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    threads.push(stem.to_string());
                }
            }
        }
        threads.sort();
        Ok(threads)
    }
}

/// Tickets kept in a single JSON ledger, rewritten after every change
pub struct FileTicketStore {
    path: PathBuf,
    ledger: Mutex<TicketLedger>,
}

impl FileTicketStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("tickets.json");
        let ledger = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            TicketLedger::new()
        };
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    /// Apply a change to the ledger and persist it if the change succeeded.
    ///
    /// The ledger lock is held across the write so files land in change order.
    async fn write<T>(&self, change: impl FnOnce(&mut TicketLedger) -> Result<T>) -> Result<T> {
        let mut ledger = self.ledger.lock().await;
        let mut updated = ledger.clone();
        let value = change(&mut updated)?;
        persist(&self.path, &updated).await?;
        *ledger = updated;
        Ok(value)
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    async fn create(&self, user_id: &str, payload: &TicketPayload) -> Result<Ticket> {
        self.write(|ledger| ledger.create(user_id, payload)).await
    }

    async fn get(&self, id: &str) -> Result<Ticket> {
        self.ledger.lock().await.get(id)
    }

    async fn update_fields(&self, id: &str, changes: &TicketChanges) -> Result<Ticket> {
        self.write(|ledger| ledger.update_fields(id, changes)).await
    }

    async fn add_message(&self, id: &str, sender: Sender, content: &str) -> Result<TicketMessage> {
        self.write(|ledger| ledger.add_message(id, sender, content)).await
    }

    async fn assign(&self, id: &str, department: &str) -> Result<Ticket> {
        self.write(|ledger| ledger.assign(id, department)).await
    }

    async fn close(&self, id: &str) -> Result<Ticket> {
        self.write(|ledger| ledger.close(id)).await
    }

    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Ticket>> {
        Ok(self.ledger.lock().await.history(user_id, limit))
    }
}

/// Answer cache kept in `<data_dir>/cache.json` so repeated questions survive restarts
pub struct FileCacheStore {
    path: PathBuf,
    entries: Mutex<Vec<CacheEntry>>,
}

impl FileCacheStore {
    /// Open the cache, starting empty when the file is missing or unreadable
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("cache.json");
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable answer cache {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn lookup(&self, scope: &str, query: &[f32]) -> Result<Option<CachedAnswer>> {
        Ok(best_cached(self.entries.lock().await.iter(), scope, query))
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
        if entries.len() > MAX_CACHE_ENTRIES {
            let excess = entries.len() - MAX_CACHE_ENTRIES;
            entries.drain(..excess);
        }
        persist(&self.path, entries.as_slice()).await
    }
}
