//! Tunables for the workflow engine

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evidence retrieval settings
    pub retrieval: RetrievalConfig,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Classifier results below this confidence fall back to a general answer
    pub router_confidence_floor: f32,
    /// Passages fetched for the service-request policy cross-check
    pub validation_top_k: usize,
    /// What a declined confirmation resets besides the task queue
    pub decline_policy: DeclinePolicy,
    /// Upper bound on stage transitions within one turn
    pub max_transitions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            router_confidence_floor: 0.55,
            validation_top_k: 1,
            decline_policy: DeclinePolicy::default(),
            max_transitions: 256,
        }
    }
}

/// Evidence retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum top score for a lookup to count as found (inclusive)
    pub threshold: f32,
    /// Number of passages kept per lookup
    pub top_k: usize,
    /// Separator placed between retrieved passages
    pub delimiter: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.82,
            top_k: 3,
            delimiter: "\n\n---\n\n".to_string(),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// A prior answer is reused only when similarity is strictly above this
    pub threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.80,
        }
    }
}

/// Behavior when the user declines a multi-task confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinePolicy {
    /// Only the task queue is cleared
    ClearQueue,
    /// The queue is cleared and the pointer, classification and per-task fields are reset
    #[default]
    ResetTask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.retrieval.threshold - 0.82).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.cache.threshold - 0.80).abs() < f32::EPSILON);
        assert!((config.router_confidence_floor - 0.55).abs() < f32::EPSILON);
        assert_eq!(config.decline_policy, DeclinePolicy::ResetTask);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"retrieval": {"threshold": 0.75}, "decline_policy": "clear_queue"}"#,
        )
        .unwrap();
        assert!((config.retrieval.threshold - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.delimiter, "\n\n---\n\n");
        assert_eq!(config.decline_policy, DeclinePolicy::ClearQueue);
        assert_eq!(config.max_transitions, 256);
    }
}
