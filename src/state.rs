use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ingest::Ingestor;
use crate::llm::{Embedder, Evaluator, HttpEmbedder, HttpEvaluator};
use crate::search::RetrievalEngine;
use crate::store::{MemoryVectorStore, VectorStore};
use crate::validate::Validator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<RetrievalEngine>,
    pub ingestor: Arc<Ingestor>,
    pub validator: Arc<Validator>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let store = MemoryVectorStore::open_or_create(&config.store_path(), config.llm.embedding_dim)?;
        let embedder = HttpEmbedder::new(http_client.clone(), config.llm.clone());
        ensure_same_dimension(&embedder, &store)?;

        let store: Arc<dyn VectorStore> = Arc::new(store);
        let embedder: Arc<dyn Embedder> = Arc::new(embedder);
        let evaluator: Arc<dyn Evaluator> = Arc::new(HttpEvaluator::new(http_client, config.llm.clone()));

        Ok(Self::from_parts(config, embedder, store, evaluator))
    }

    /// Wire the services around already-built backends.
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        let engine = Arc::new(RetrievalEngine::new(
            embedder.clone(),
            store.clone(),
            config.retrieval.clone(),
        ));
        let ingestor = Arc::new(Ingestor::new(
            embedder,
            store,
            Duration::from_millis(config.ingest.embed_delay_ms),
        ));
        let validator = Arc::new(Validator::new(engine.clone(), evaluator, &config.ingest));

        Self {
            config,
            engine,
            ingestor,
            validator,
        }
    }
}

/// Vectors from the embedder must fit the store they are written to.
fn ensure_same_dimension(embedder: &dyn Embedder, store: &MemoryVectorStore) -> anyhow::Result<()> {
    anyhow::ensure!(
        embedder.dimension() == store.dimension(),
        "Embedder produces {}-dim vectors but the record store holds {}-dim vectors",
        embedder.dimension(),
        store.dimension()
    );
    Ok(())
}
