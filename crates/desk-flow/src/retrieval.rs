//! Threshold-gated evidence retrieval

use std::sync::Arc;

use desk_ai::Embedder;

use crate::config::RetrievalConfig;
use crate::store::{EvidenceStore, Passage};

/// Result of one evidence lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    /// Retrieved passages in rank order, joined by the configured delimiter
    pub context: String,
    /// Best score, 0.0 when nothing was retrieved
    pub score: f32,
    /// Whether the best score reached the acceptance threshold
    pub found: bool,
    pub passages: Vec<Passage>,
}

impl Evidence {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Embeds a query, searches the evidence store and applies the acceptance threshold
pub struct EvidenceRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn EvidenceStore>,
    config: RetrievalConfig,
}

impl EvidenceRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EvidenceStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Look up evidence for `query`. Embedding or store failures degrade to not found.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Evidence {
        if query.trim().is_empty() || top_k == 0 {
            return Evidence::not_found();
        }

        let vector = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Evidence lookup skipped, embedding failed: {}", e);
                return Evidence::not_found();
            }
        };

        match self.store.search(&vector, top_k).await {
            Ok(passages) => self.rank(passages, top_k),
            Err(e) => {
                tracing::warn!("Evidence lookup failed: {}", e);
                Evidence::not_found()
            }
        }
    }

    /// Order passages by descending score and apply the threshold.
    ///
    /// The sort is stable, so equal scores keep the order the store returned.
    pub fn rank(&self, mut passages: Vec<Passage>, top_k: usize) -> Evidence {
        passages.retain(|p| p.score.is_finite());
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(top_k);

        let Some(top) = passages.first() else {
            return Evidence::not_found();
        };
        let score = top.score;
        let context = passages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(&self.config.delimiter);

        tracing::debug!(
            "Evidence: {} passages, top score {:.3} (threshold {:.2})",
            passages.len(),
            score,
            self.config.threshold
        );

        Evidence {
            context,
            score,
            found: score >= self.config.threshold,
            passages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryEvidenceStore;
    use crate::testing::{FailingEvidenceStore, FakeEmbedder};

    fn passage(text: &str, score: f32) -> Passage {
        Passage {
            text: text.into(),
            score,
        }
    }

    fn retriever(threshold: f32) -> EvidenceRetriever {
        EvidenceRetriever::new(
            Arc::new(FakeEmbedder::new()),
            Arc::new(MemoryEvidenceStore::default()),
            RetrievalConfig {
                threshold,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rank_orders_and_joins() {
        let r = retriever(0.82);
        let evidence = r.rank(
            vec![passage("b", 0.70), passage("a", 0.90), passage("c", 0.10)],
            2,
        );
        assert_eq!(evidence.score, 0.90);
        assert!(evidence.found);
        assert_eq!(evidence.context, "a\n\n---\n\nb");
        assert_eq!(evidence.passages.len(), 2);
    }

    #[test]
    fn test_rank_ties_are_stable() {
        let r = retriever(0.5);
        let evidence = r.rank(vec![passage("x", 0.6), passage("y", 0.6)], 3);
        assert_eq!(evidence.context, "x\n\n---\n\ny");
    }

    #[test]
    fn test_rank_drops_non_finite_scores() {
        let r = retriever(0.5);
        let evidence = r.rank(vec![passage("nan", f32::NAN), passage("ok", 0.4)], 3);
        assert_eq!(evidence.passages.len(), 1);
        assert_eq!(evidence.score, 0.4);
        assert!(!evidence.found);
    }

    #[test]
    fn test_acceptance_is_monotonic() {
        let r = retriever(0.82);
        let at = r.rank(vec![passage("a", 0.82)], 1);
        let above = r.rank(vec![passage("a", 0.95)], 1);
        let below = r.rank(vec![passage("a", 0.8199)], 1);
        assert!(at.found);
        assert!(above.found);
        assert!(!below.found);
        assert!(!r.rank(vec![], 3).found);
    }

    #[tokio::test]
    async fn test_store_failure_degrades() {
        let r = EvidenceRetriever::new(
            Arc::new(FakeEmbedder::new()),
            Arc::new(FailingEvidenceStore),
            RetrievalConfig::default(),
        );
        let evidence = r.retrieve("leave policy", 3).await;
        assert_eq!(evidence, Evidence::not_found());
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades() {
        let r = EvidenceRetriever::new(
            Arc::new(FakeEmbedder::failing()),
            Arc::new(MemoryEvidenceStore::default()),
            RetrievalConfig::default(),
        );
        assert!(!r.retrieve("leave policy", 3).await.found);
    }

    #[tokio::test]
    async fn test_retrieve_against_corpus() {
        let embedder = FakeEmbedder::new();
        let store = MemoryEvidenceStore::default();
        store.add(embedder.document("Annual leave is 25 days per year."));
        store.add(embedder.document("Laptops are refreshed every three years."));
        let r = EvidenceRetriever::new(
            Arc::new(embedder),
            Arc::new(store),
            RetrievalConfig::default(),
        );
        let evidence = r.retrieve("Annual leave is 25 days per year.", 3).await;
        assert!(evidence.found);
        assert!(evidence.context.starts_with("Annual leave"));
    }
}
