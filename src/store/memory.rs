use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::query::{Filterable, NearestQuery};
use super::{Scored, VectorStore};
use crate::error::{EmbeddingError, Error, Result};
use crate::models::{CodeExample, KnowledgeDocument, SearchStats};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Records {
    documents: Vec<KnowledgeDocument>,
    examples: Vec<CodeExample>,
}

/// In-memory record store with optional disk persistence and brute-force
/// cosine search. Insertion order is kept, so equal distances come back in
/// the order records were written.
pub struct MemoryVectorStore {
    records: RwLock<Records>,
    persist_path: Option<PathBuf>,
    dimension: usize,
}

impl MemoryVectorStore {
    /// A store that never touches disk.
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            persist_path: None,
            dimension,
        }
    }

    pub fn open_or_create(path: &Path, dimension: usize) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records: Records = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read record store")?;
            serde_json::from_str(&data).context("Failed to parse record store")?
        } else {
            Records::default()
        };

        let stale = records
            .documents
            .iter()
            .filter_map(|d| d.embedding.as_ref())
            .chain(records.examples.iter().filter_map(|e| e.embedding.as_ref()))
            .find(|v| v.len() != dimension);
        if let Some(v) = stale {
            anyhow::bail!(
                "Record store at {} holds {}-dim embeddings but {dimension} is configured",
                path.display(),
                v.len()
            );
        }

        Ok(Self {
            records: RwLock::new(records),
            persist_path: Some(path.to_path_buf()),
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: Option<&Vec<f32>>) -> Result<()> {
        match vector {
            Some(v) if v.len() != self.dimension => {
                Err(EmbeddingError::dimension_mismatch(self.dimension, v.len()).into())
            }
            _ => Ok(()),
        }
    }

    /// Apply `change` to a staged copy and make it visible only once it is
    /// on disk, so a failed write leaves both views untouched.
    fn commit<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Records) -> Result<()>,
    {
        let mut records = self.records.write();
        if self.persist_path.is_none() {
            return change(&mut records);
        }
        let mut staged = records.clone();
        change(&mut staged)?;
        self.persist(&staged)?;
        *records = staged;
        Ok(())
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, records: &Records) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(records)
            .map_err(|e| Error::Retrieval(format!("Failed to serialize records: {e}")))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)
            .and_then(|_| std::fs::rename(&tmp_path, path))
            .map_err(|e| Error::Retrieval(format!("Failed to persist records: {e}")))
    }

    fn nearest<T: Filterable + Clone>(
        &self,
        rows: &[T],
        embedding_of: impl Fn(&T) -> Option<&Vec<f32>>,
        query: &NearestQuery,
    ) -> Result<Vec<Scored<T>>> {
        self.check_dimension(Some(&query.vector))?;

        let mut scored: Vec<Scored<T>> = rows
            .iter()
            .filter(|r| query.matches(*r))
            .filter_map(|r| {
                let embedding = embedding_of(r)?;
                let distance = 1.0 - cosine_similarity(&query.vector, embedding);
                (distance <= query.max_distance).then(|| Scored {
                    record: r.clone(),
                    distance,
                })
            })
            .collect();

        // Stable: ties keep insertion order
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(query.limit);
        Ok(scored)
    }
}

fn check_quality(example: &CodeExample) -> Result<()> {
    if example.quality_score > 100 {
        return Err(Error::InvalidInput(format!(
            "quality score {} is outside 0..=100",
            example.quality_score
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_document(&self, doc: KnowledgeDocument) -> Result<()> {
        self.check_dimension(doc.embedding.as_ref())?;
        self.commit(|records| {
            records.documents.push(doc);
            Ok(())
        })
    }

    async fn update_document(&self, doc: KnowledgeDocument) -> Result<()> {
        self.check_dimension(doc.embedding.as_ref())?;
        self.commit(|records| {
            let slot = records
                .documents
                .iter_mut()
                .find(|d| d.id == doc.id)
                .ok_or(Error::NotFound(doc.id))?;
            *slot = doc;
            Ok(())
        })
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.commit(|records| {
            let before = records.documents.len();
            records.documents.retain(|d| d.id != id);
            if records.documents.len() == before {
                return Err(Error::NotFound(id));
            }
            Ok(())
        })
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<KnowledgeDocument>> {
        Ok(self.records.read().documents.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_example(&self, example: CodeExample) -> Result<()> {
        check_quality(&example)?;
        self.check_dimension(example.embedding.as_ref())?;
        self.commit(|records| {
            records.examples.push(example);
            Ok(())
        })
    }

    async fn update_example(&self, example: CodeExample) -> Result<()> {
        check_quality(&example)?;
        self.check_dimension(example.embedding.as_ref())?;
        self.commit(|records| {
            let slot = records
                .examples
                .iter_mut()
                .find(|e| e.id == example.id)
                .ok_or(Error::NotFound(example.id))?;
            *slot = example;
            Ok(())
        })
    }

    async fn delete_example(&self, id: Uuid) -> Result<()> {
        self.commit(|records| {
            let before = records.examples.len();
            records.examples.retain(|e| e.id != id);
            if records.examples.len() == before {
                return Err(Error::NotFound(id));
            }
            Ok(())
        })
    }

    async fn get_example(&self, id: Uuid) -> Result<Option<CodeExample>> {
        Ok(self.records.read().examples.iter().find(|e| e.id == id).cloned())
    }

    async fn nearest_documents(&self, query: &NearestQuery) -> Result<Vec<Scored<KnowledgeDocument>>> {
        let records = self.records.read();
        self.nearest(&records.documents, |d| d.embedding.as_ref(), query)
    }

    async fn nearest_examples(&self, query: &NearestQuery) -> Result<Vec<Scored<CodeExample>>> {
        let records = self.records.read();
        self.nearest(&records.examples, |e| e.embedding.as_ref(), query)
    }

    async fn stats(&self) -> Result<SearchStats> {
        let records = self.records.read();

        let mut documents_by_type = BTreeMap::new();
        for d in &records.documents {
            *documents_by_type.entry(d.doc_type.as_str().to_string()).or_insert(0) += 1;
        }

        let mut examples_by_category = BTreeMap::new();
        for e in &records.examples {
            let key = e.category.clone().unwrap_or_else(|| "uncategorized".to_string());
            *examples_by_category.entry(key).or_insert(0) += 1;
        }

        let average_quality_score = if records.examples.is_empty() {
            None
        } else {
            let total: u32 = records.examples.iter().map(|e| e.quality_score as u32).sum();
            Some(total as f32 / records.examples.len() as f32)
        };

        Ok(SearchStats {
            total_documents: records.documents.len(),
            embedded_documents: records.documents.iter().filter(|d| d.embedding.is_some()).count(),
            total_examples: records.examples.len(),
            embedded_examples: records.examples.iter().filter(|e| e.embedding.is_some()).count(),
            documents_by_type,
            examples_by_category,
            average_quality_score,
        })
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 for a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use chrono::Utc;

    fn doc(title: &str, embedding: Option<Vec<f32>>) -> KnowledgeDocument {
        KnowledgeDocument {
            id: Uuid::new_v4(),
            title: title.into(),
            content: format!("content of {title}"),
            section: None,
            doc_type: DocumentType::BestPractice,
            embedding,
            metadata: Default::default(),
            created_at: Utc::now(),
        }
    }

    fn example(quality: u8, category: Option<&str>) -> CodeExample {
        CodeExample {
            id: Uuid::new_v4(),
            title: "ex".into(),
            code: "def rule(event):\n    return True".into(),
            quality_score: quality,
            category: category.map(String::from),
            description: None,
            embedding: Some(vec![1.0, 0.0, 0.0]),
            tags: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance_and_skips_unembedded() {
        let store = MemoryVectorStore::new(3);
        store.insert_document(doc("far", Some(vec![0.0, 1.0, 0.0]))).await.unwrap();
        store.insert_document(doc("near", Some(vec![0.9, 0.1, 0.0]))).await.unwrap();
        store.insert_document(doc("pending", None)).await.unwrap();

        let rows = store
            .nearest_documents(&NearestQuery::new(vec![1.0, 0.0, 0.0], 10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.title, "near");
        assert!(rows[0].distance <= rows[1].distance);
    }

    #[tokio::test]
    async fn test_nearest_respects_threshold_and_limit() {
        let store = MemoryVectorStore::new(3);
        for i in 0..5 {
            store
                .insert_document(doc(&format!("d{i}"), Some(vec![1.0, 0.05 * i as f32, 0.0])))
                .await
                .unwrap();
        }
        store.insert_document(doc("orthogonal", Some(vec![0.0, 0.0, 1.0]))).await.unwrap();

        let q = NearestQuery::new(vec![1.0, 0.0, 0.0], 3).min_similarity(0.9);
        let rows = store.nearest_documents(&q).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.similarity() >= 0.9 - 1e-6));
    }

    #[tokio::test]
    async fn test_equal_distances_keep_insertion_order() {
        let store = MemoryVectorStore::new(2);
        store.insert_document(doc("first", Some(vec![1.0, 0.0]))).await.unwrap();
        store.insert_document(doc("second", Some(vec![2.0, 0.0]))).await.unwrap();
        let rows = store
            .nearest_documents(&NearestQuery::new(vec![1.0, 0.0], 10))
            .await
            .unwrap();
        assert_eq!(rows[0].record.title, "first");
        assert_eq!(rows[1].record.title, "second");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected_not_padded() {
        let store = MemoryVectorStore::new(4);
        let err = store
            .insert_document(doc("short", Some(vec![1.0, 0.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));

        let err = store
            .nearest_documents(&NearestQuery::new(vec![1.0, 0.0], 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_quality_score_enforced_on_write() {
        let store = MemoryVectorStore::new(3);
        let err = store.insert_example(example(101, None)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        store.insert_example(example(100, None)).await.unwrap();
        store.insert_example(example(0, None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_ids() {
        let store = MemoryVectorStore::new(3);
        let missing = doc("ghost", None);
        let id = missing.id;
        assert!(matches!(store.update_document(missing).await, Err(Error::NotFound(x)) if x == id));
        assert!(matches!(store.delete_example(id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_breakdowns() {
        let store = MemoryVectorStore::new(3);
        store.insert_document(doc("a", Some(vec![1.0, 0.0, 0.0]))).await.unwrap();
        store.insert_document(doc("b", None)).await.unwrap();
        store.insert_example(example(80, Some("aws"))).await.unwrap();
        store.insert_example(example(60, None)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.embedded_documents, 1);
        assert_eq!(stats.documents_by_type.get("best-practice"), Some(&2));
        assert_eq!(stats.examples_by_category.get("aws"), Some(&1));
        assert_eq!(stats.examples_by_category.get("uncategorized"), Some(&1));
        assert_eq!(stats.average_quality_score, Some(70.0));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        {
            let store = MemoryVectorStore::open_or_create(&path, 3).unwrap();
            store.insert_document(doc("kept", Some(vec![1.0, 0.0, 0.0]))).await.unwrap();
        }
        let reopened = MemoryVectorStore::open_or_create(&path, 3).unwrap();
        assert_eq!(reopened.stats().await.unwrap().total_documents, 1);

        // Reopening with a different dimensionality fails loudly
        assert!(MemoryVectorStore::open_or_create(&path, 5).is_err());
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_records_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = MemoryVectorStore::open_or_create(&path, 3).unwrap();
        let kept = doc("kept", Some(vec![1.0, 0.0, 0.0]));
        let kept_id = kept.id;
        store.insert_document(kept).await.unwrap();

        // A directory where the temp file should go makes every write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        let lost = doc("lost", Some(vec![1.0, 0.0, 0.0]));
        let lost_id = lost.id;
        let err = store.insert_document(lost).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
        assert!(store.get_document(lost_id).await.unwrap().is_none());

        assert!(store.delete_document(kept_id).await.is_err());
        assert!(store.get_document(kept_id).await.unwrap().is_some());

        let rows = store
            .nearest_documents(&NearestQuery::new(vec![1.0, 0.0, 0.0], 10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.stats().await.unwrap().total_documents, 1);
    }
}
