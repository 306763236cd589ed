use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::chunking::{chunk_text, DEFAULT_CHAR_BUDGET};
use crate::error::{EmbeddingError, Error, Result};
use crate::llm::Embedder;
use crate::models::{CodeExample, DocumentType, ExampleRequest, KnowledgeDocument};
use crate::store::VectorStore;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
    pub ids: Vec<Uuid>,
}

/// Writes documents and examples, keeping embeddings in step with content.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    embed_delay: Duration,
    chunk_budget: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, embed_delay: Duration) -> Self {
        Self {
            embedder,
            store,
            embed_delay,
            chunk_budget: DEFAULT_CHAR_BUDGET,
        }
    }

    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget;
        self
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let clean = self.embedder.preprocess(text);
        self.embedder.embed(&clean).await
    }

    /// Chunk `text` and store each chunk as a document.
    ///
    /// Embedding runs one chunk at a time with `embed_delay` between calls.
    /// A chunk whose embedding fails is logged and skipped; store failures
    /// abort the ingestion.
    pub async fn ingest_text(
        &self,
        title: &str,
        text: &str,
        section: Option<&str>,
        doc_type: DocumentType,
    ) -> Result<IngestReport> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("document text is empty".to_string()));
        }

        let chunks = chunk_text(text, self.chunk_budget);
        let total = chunks.len();
        let mut report = IngestReport {
            inserted: 0,
            skipped: 0,
            ids: Vec::with_capacity(total),
        };

        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 && !self.embed_delay.is_zero() {
                tokio::time::sleep(self.embed_delay).await;
            }

            let embedding = match self.embed(&chunk.content).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Skipping chunk {}/{total} of '{title}': {e}", i + 1);
                    report.skipped += 1;
                    continue;
                }
            };

            let mut metadata = serde_json::Map::new();
            metadata.insert("source_title".into(), title.into());
            metadata.insert("chunk_index".into(), i.into());
            metadata.insert("start_line".into(), chunk.start_line.into());
            metadata.insert("end_line".into(), chunk.end_line.into());

            let doc = KnowledgeDocument {
                id: Uuid::new_v4(),
                title: if total > 1 {
                    format!("{title} (part {}/{total})", i + 1)
                } else {
                    title.to_string()
                },
                content: chunk.content,
                section: section.map(String::from),
                doc_type,
                embedding: Some(embedding),
                metadata,
                created_at: Utc::now(),
            };

            report.ids.push(doc.id);
            self.store.insert_document(doc).await?;
            report.inserted += 1;
        }

        tracing::info!(
            "Ingested '{title}': {} chunks stored, {} skipped",
            report.inserted,
            report.skipped
        );
        Ok(report)
    }

    /// Replace a document's content and regenerate its embedding.
    pub async fn update_document_content(&self, id: Uuid, content: &str) -> Result<KnowledgeDocument> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("document content is empty".to_string()));
        }
        let mut doc = self.store.get_document(id).await?.ok_or(Error::NotFound(id))?;

        if doc.content != content || doc.embedding.is_none() {
            doc.embedding = Some(self.embed(content).await?);
            doc.content = content.to_string();
        }

        self.store.update_document(doc.clone()).await?;
        Ok(doc)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.store.delete_document(id).await
    }

    pub async fn add_example(&self, req: ExampleRequest) -> Result<CodeExample> {
        let quality_score = validate_example(&req)?;
        let embedding = self.embed(&req.code).await?;

        let example = CodeExample {
            id: Uuid::new_v4(),
            title: req.title,
            code: req.code,
            quality_score,
            category: req.category,
            description: req.description,
            embedding: Some(embedding),
            tags: req.tags,
            created_at: Utc::now(),
        };
        self.store.insert_example(example.clone()).await?;
        Ok(example)
    }

    /// Overwrite an example; the embedding is regenerated only when the
    /// code changed.
    pub async fn update_example(&self, id: Uuid, req: ExampleRequest) -> Result<CodeExample> {
        let quality_score = validate_example(&req)?;
        let mut example = self.store.get_example(id).await?.ok_or(Error::NotFound(id))?;

        if example.code != req.code || example.embedding.is_none() {
            example.embedding = Some(self.embed(&req.code).await?);
        }
        example.title = req.title;
        example.code = req.code;
        example.quality_score = quality_score;
        example.category = req.category;
        example.description = req.description;
        example.tags = req.tags;

        self.store.update_example(example.clone()).await?;
        Ok(example)
    }

    pub async fn delete_example(&self, id: Uuid) -> Result<()> {
        self.store.delete_example(id).await
    }
}

fn validate_example(req: &ExampleRequest) -> Result<u8> {
    if req.code.trim().is_empty() {
        return Err(Error::InvalidInput("example code is empty".to_string()));
    }
    u8::try_from(req.quality_score)
        .ok()
        .filter(|q| *q <= 100)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "quality score {} is outside 0..=100",
                req.quality_score
            ))
        })
}
