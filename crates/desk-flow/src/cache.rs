//! Semantic result cache around answer generation

use std::future::Future;
use std::sync::Arc;

use desk_ai::{AnswerRequest, Embedder};
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::store::{CacheEntry, CacheStore};

/// An answer and whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReply {
    pub text: String,
    /// Similarity of the reused entry, `None` when freshly generated
    pub hit: Option<f32>,
}

/// Digest of everything besides the user text that shapes an answer.
///
/// Requests with different system prompts or grounding context never share entries.
pub fn scope_key(request: &AnswerRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.system.as_bytes());
    hasher.update([0u8]);
    if let Some(context) = &request.context {
        hasher.update([1u8]);
        hasher.update(context.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Reuses a prior answer when a sufficiently similar query was seen before
pub struct ResultCache {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Return a cached answer for `request`, or run `generate` and record its output.
    ///
    /// The user text is matched by embedding within the request's [`scope_key`].
    /// Cache faults are logged and never fail the call; only `generate` can.
    pub async fn get_or_generate<F, Fut>(
        &self,
        request: &AnswerRequest,
        generate: F,
    ) -> desk_ai::Result<CachedReply>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = desk_ai::Result<String>>,
    {
        let query = request.user.trim();
        if !self.config.enabled || query.is_empty() {
            return Ok(CachedReply {
                text: generate().await?,
                hit: None,
            });
        }

        let scope = scope_key(request);
        let embedding = match self.embedder.embed(query).await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Cache bypassed, embedding failed: {}", e);
                None
            }
        };

        if let Some(vector) = &embedding {
            match self.store.lookup(&scope, vector).await {
                Ok(Some(best)) if best.similarity > self.config.threshold => {
                    tracing::debug!("Cache hit ({:.3}) for query: {}", best.similarity, query);
                    return Ok(CachedReply {
                        text: best.answer,
                        hit: Some(best.similarity),
                    });
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Cache lookup failed: {}", e),
            }
        }

        let text = generate().await?;
        if let Some(embedding) = embedding {
            let entry = CacheEntry {
                scope,
                embedding,
                query: query.to_string(),
                answer: text.clone(),
            };
            if let Err(e) = self.store.store(entry).await {
                tracing::warn!("Cache write failed: {}", e);
            }
        }
        Ok(CachedReply { text, hit: None })
    }
}
