use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the record store is persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration (embeddings + evaluation)
    pub llm: LlmConfig,
    /// Search thresholds and authority labels
    pub retrieval: RetrievalConfig,
    /// Ingestion pacing and evaluator retry policy
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for validation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension. Used end-to-end; mismatches are errors.
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default result count for generic searches
    pub top_k: usize,
    /// Default similarity floor for generic searches
    pub min_similarity: f32,
    /// Weighted document search inside the enhanced context
    pub context_rule_top_k: usize,
    pub context_rule_min_similarity: f32,
    /// Keyword-gated search inside the enhanced context
    pub context_keyword_top_k: usize,
    /// Example search inside the enhanced context
    pub context_example_top_k: usize,
    pub context_example_min_similarity: f32,
    /// Cap on merged documents in the enhanced context
    pub context_max_documents: usize,
    /// Section label of the canonical rule reference
    pub authoritative_rule_section: String,
    /// Section label of the canonical authoring guide
    pub authoritative_guide_section: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Pause between sequential embedding calls during bulk ingestion
    pub embed_delay_ms: u64,
    /// Retries for rate-limited evaluator calls
    pub max_retries: u32,
    /// First backoff step; doubles on every retry
    pub base_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 1536,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.7,
            context_rule_top_k: 3,
            context_rule_min_similarity: 0.75,
            context_keyword_top_k: 2,
            context_example_top_k: 2,
            context_example_min_similarity: 0.6,
            context_max_documents: 5,
            authoritative_rule_section: "Detection Rules".to_string(),
            authoritative_guide_section: "Writing Guide".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_delay_ms: 200,
            max_retries: 3,
            base_backoff_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RULE_VALIDATOR_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("RULE_VALIDATOR_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Retrieval thresholds
        if let Ok(val) = std::env::var("RULE_VALIDATOR_TOP_K") {
            if let Some(v) = parse_positive(&val) {
                config.retrieval.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("RULE_VALIDATOR_MIN_SIMILARITY") {
            if let Ok(v) = val.parse::<f32>() {
                config.retrieval.min_similarity = v.clamp(0.0, 1.0);
            }
        }
        if let Ok(label) = std::env::var("RULE_VALIDATOR_RULE_SECTION") {
            config.retrieval.authoritative_rule_section = label;
        }
        if let Ok(label) = std::env::var("RULE_VALIDATOR_GUIDE_SECTION") {
            config.retrieval.authoritative_guide_section = label;
        }

        // Ingestion / retry policy
        if let Ok(val) = std::env::var("RULE_VALIDATOR_EMBED_DELAY_MS") {
            if let Ok(v) = val.parse() {
                config.ingest.embed_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("RULE_VALIDATOR_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                config.ingest.max_retries = v;
            }
        }
        if let Ok(val) = std::env::var("RULE_VALIDATOR_BASE_BACKOFF_MS") {
            if let Ok(v) = val.parse() {
                config.ingest.base_backoff_ms = v;
            }
        }

        config
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("records.json")
    }
}

/// Result counts of zero would make every default search fail.
fn parse_positive(val: &str) -> Option<usize> {
    val.trim().parse().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_single_dimension() {
        let config = Config::default();
        assert_eq!(config.llm.embedding_dim, 1536);
        assert_eq!(config.retrieval.context_max_documents, 5);
        assert!(config.retrieval.context_rule_min_similarity > config.retrieval.context_example_min_similarity);
    }

    #[test]
    fn test_top_k_must_be_positive() {
        assert_eq!(parse_positive("7"), Some(7));
        assert_eq!(parse_positive(" 3 "), Some(3));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-2"), None);
        assert_eq!(parse_positive("many"), None);
    }

    #[test]
    fn test_store_path_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/rv"),
            ..Config::default()
        };
        assert_eq!(config.store_path(), PathBuf::from("/tmp/rv/records.json"));
    }
}
