//! Record storage with nearest-neighbour queries.
//!
//! The [`VectorStore`] trait is the seam between the retrieval engine and
//! whatever holds the documents; [`memory::MemoryVectorStore`] is the
//! bundled implementation.

pub mod memory;
pub mod query;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CodeExample, KnowledgeDocument, SearchStats};

pub use memory::MemoryVectorStore;
pub use query::{NearestQuery, Predicate};

/// A row returned from a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub record: T,
    /// Cosine distance, `1 - cosine_similarity`.
    pub distance: f32,
}

impl<T> Scored<T> {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Storage backend for knowledge documents and code examples.
///
/// Failures surface as [`crate::error::Error::Retrieval`]; writes with an
/// embedding of the wrong dimensionality fail with an embedding error.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert_document(&self, doc: KnowledgeDocument) -> Result<()>;
    async fn update_document(&self, doc: KnowledgeDocument) -> Result<()>;
    async fn delete_document(&self, id: Uuid) -> Result<()>;
    async fn get_document(&self, id: Uuid) -> Result<Option<KnowledgeDocument>>;

    async fn insert_example(&self, example: CodeExample) -> Result<()>;
    async fn update_example(&self, example: CodeExample) -> Result<()>;
    async fn delete_example(&self, id: Uuid) -> Result<()>;
    async fn get_example(&self, id: Uuid) -> Result<Option<CodeExample>>;

    /// Embedded documents matching `query`, ascending by distance.
    async fn nearest_documents(&self, query: &NearestQuery) -> Result<Vec<Scored<KnowledgeDocument>>>;

    /// Embedded examples matching `query`, ascending by distance.
    async fn nearest_examples(&self, query: &NearestQuery) -> Result<Vec<Scored<CodeExample>>>;

    async fn stats(&self) -> Result<SearchStats>;
}
