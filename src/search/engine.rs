use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::llm::Embedder;
use crate::models::{
    CodeExample, ExampleSearchResult, KnowledgeDocument, RetrievalContext, SearchMetadata,
    SearchResult, SearchStats,
};
use crate::search::authority::AuthorityLabels;
use crate::search::compliance::estimate_compliance;
use crate::search::prompt::build_prompt;
use crate::store::{NearestQuery, Scored, VectorStore};

/// Markers that gate the keyword search: the rule entry point and the
/// safe accessor calls.
pub const KEYWORD_MARKERS: [&str; 4] = ["def rule(", "event.get(", "deep_get(", ".get("];

/// Similarity floor for the keyword-gated search.
pub const KEYWORD_MIN_SIMILARITY: f32 = 0.5;

/// Similarity search over knowledge documents and code examples, with
/// authority re-ranking and prompt assembly.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
    labels: AuthorityLabels,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        let labels = AuthorityLabels::new(
            config.authoritative_rule_section.clone(),
            config.authoritative_guide_section.clone(),
        );
        Self {
            embedder,
            store,
            config,
            labels,
        }
    }

    pub fn labels(&self) -> &AuthorityLabels {
        &self.labels
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let clean = self.embedder.preprocess(text);
        Ok(self.embedder.embed(&clean).await?)
    }

    // ─── Documents ───────────────────────────────────────

    /// Documents with similarity >= `min_similarity`, most similar first,
    /// at most `top_k`.
    pub async fn search_documents(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        check_params(top_k, min_similarity)?;
        let vector = self.embed_query(query).await?;
        self.documents_near(vector, top_k, min_similarity).await
    }

    /// Like [`Self::search_documents`], with every similarity multiplied by
    /// its authority weight and the list re-sorted on the weighted score.
    pub async fn search_documents_weighted(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        check_params(top_k, min_similarity)?;
        let vector = self.embed_query(query).await?;
        self.weighted_documents_near(vector, top_k, min_similarity).await
    }

    /// Documents containing at least one of [`KEYWORD_MARKERS`], ranked by
    /// raw similarity. Best-effort: failures log and yield an empty list.
    pub async fn search_by_keyword_and_vector(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let result = async {
            check_params(top_k, KEYWORD_MIN_SIMILARITY)?;
            let vector = self.embed_query(query).await?;
            self.keyword_documents_near(vector, top_k).await
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!("Keyword search failed, continuing without it: {e}");
            Vec::new()
        })
    }

    /// Weighted search with the configured defaults.
    pub async fn search_relevant_rules(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search_documents_weighted(query, self.config.top_k, self.config.min_similarity)
            .await
    }

    async fn documents_near(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        let query = NearestQuery::new(vector, top_k).min_similarity(min_similarity);
        let rows = self.store.nearest_documents(&query).await?;
        Ok(to_search_results(rows, min_similarity))
    }

    async fn weighted_documents_near(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        // Rank every document above the threshold; weighting can lift any of
        // them past closer matches.
        let candidates = self.documents_near(vector, usize::MAX, min_similarity).await?;
        let mut ranked = self.labels.rerank(candidates);
        ranked.truncate(top_k);
        Ok(ranked)
    }

    async fn keyword_documents_near(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<SearchResult>> {
        let query = NearestQuery::new(vector, top_k)
            .min_similarity(KEYWORD_MIN_SIMILARITY)
            .content_contains_any(KEYWORD_MARKERS);
        let rows = self.store.nearest_documents(&query).await?;
        Ok(to_search_results(rows, KEYWORD_MIN_SIMILARITY))
    }

    // ─── Examples ────────────────────────────────────────

    /// Examples most similar to `code`.
    pub async fn search_examples(
        &self,
        code: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ExampleSearchResult>> {
        check_params(top_k, min_similarity)?;
        let vector = self.embed_query(code).await?;
        self.examples_near(NearestQuery::new(vector, top_k).min_similarity(min_similarity))
            .await
    }

    /// Example search with the configured defaults.
    pub async fn search_similar_examples(&self, code: &str) -> Result<Vec<ExampleSearchResult>> {
        self.search_examples(code, self.config.top_k, self.config.min_similarity)
            .await
    }

    /// Examples in one category. Best-effort like the keyword search.
    pub async fn search_examples_by_category(
        &self,
        code: &str,
        category: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<ExampleSearchResult> {
        let result = async {
            check_params(top_k, min_similarity)?;
            let vector = self.embed_query(code).await?;
            let query = NearestQuery::new(vector, top_k)
                .min_similarity(min_similarity)
                .category(category);
            self.examples_near(query).await
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!("Category search for '{category}' failed: {e}");
            Vec::new()
        })
    }

    async fn examples_near(&self, query: NearestQuery) -> Result<Vec<ExampleSearchResult>> {
        let min_similarity = 1.0 - query.max_distance;
        let rows = self.store.nearest_examples(&query).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.similarity(), row.record))
            .filter(|(sim, _)| *sim >= min_similarity)
            .map(|(sim, ex)| example_result(ex, sim))
            .collect())
    }

    // ─── Context ─────────────────────────────────────────

    /// Gather documents and examples for `code` and assemble the prompt.
    ///
    /// The code is embedded once; the weighted, keyword and example queries
    /// then run concurrently. The first failure aborts the whole build.
    pub async fn build_enhanced_context(&self, code: &str) -> Result<RetrievalContext> {
        let started = Instant::now();
        let cfg = &self.config;

        let vector = self.embed_query(code).await?;

        let keyword = async {
            let found = self
                .keyword_documents_near(vector.clone(), cfg.context_keyword_top_k)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Keyword search failed, continuing without it: {e}");
                    Vec::new()
                });
            Ok::<_, Error>(found)
        };

        let (weighted, keyword, examples) = tokio::try_join!(
            self.weighted_documents_near(
                vector.clone(),
                cfg.context_rule_top_k,
                cfg.context_rule_min_similarity,
            ),
            keyword,
            self.examples_near(
                NearestQuery::new(vector.clone(), cfg.context_example_top_k)
                    .min_similarity(cfg.context_example_min_similarity),
            ),
        )?;

        tracing::debug!(
            weighted = weighted.len(),
            keyword = keyword.len(),
            examples = examples.len(),
            "Context searches complete"
        );

        let documents = merge_documents(weighted, keyword, cfg.context_max_documents);
        let compliance = estimate_compliance(code, &documents);
        let prompt = build_prompt(&documents, &examples, Some(&compliance), &self.labels);

        let metadata = SearchMetadata {
            documents_found: documents.len(),
            examples_found: examples.len(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Built context: {} documents, {} examples, compliance {}/100 in {}ms",
            metadata.documents_found,
            metadata.examples_found,
            compliance.score,
            metadata.processing_time_ms
        );

        Ok(RetrievalContext {
            relevant_documents: documents,
            similar_examples: examples,
            prompt,
            metadata,
            compliance: Some(compliance),
        })
    }

    pub async fn get_search_stats(&self) -> Result<SearchStats> {
        self.store.stats().await
    }
}

fn check_params(top_k: usize, min_similarity: f32) -> Result<()> {
    if top_k == 0 {
        return Err(Error::InvalidInput("top_k must be positive".to_string()));
    }
    if !(0.0..=1.0).contains(&min_similarity) {
        return Err(Error::InvalidInput(format!(
            "min_similarity {min_similarity} is outside [0, 1]"
        )));
    }
    Ok(())
}

fn to_search_results(rows: Vec<Scored<KnowledgeDocument>>, min_similarity: f32) -> Vec<SearchResult> {
    rows.into_iter()
        .map(|row| (row.similarity(), row.record))
        .filter(|(sim, _)| *sim >= min_similarity)
        .map(|(sim, doc)| SearchResult {
            id: doc.id,
            title: doc.title,
            content: doc.content,
            section: doc.section,
            doc_type: doc.doc_type,
            similarity: sim,
            metadata: (!doc.metadata.is_empty()).then_some(doc.metadata),
        })
        .collect()
}

fn example_result(ex: CodeExample, similarity: f32) -> ExampleSearchResult {
    ExampleSearchResult {
        id: ex.id,
        title: ex.title,
        code: ex.code,
        quality_score: ex.quality_score,
        category: ex.category,
        description: ex.description,
        similarity,
        tags: ex.tags,
    }
}

/// Concatenate, keep the first occurrence of each id, cap at `max`.
pub fn merge_documents(
    primary: Vec<SearchResult>,
    secondary: Vec<SearchResult>,
    max: usize,
) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(secondary)
        .filter(|d| seen.insert(d.id))
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use uuid::Uuid;

    fn result(id: Uuid, title: &str) -> SearchResult {
        SearchResult {
            id,
            title: title.into(),
            content: String::new(),
            section: None,
            doc_type: DocumentType::BestPractice,
            similarity: 0.8,
            metadata: None,
        }
    }

    #[test]
    fn test_merge_keeps_first_seen() {
        let shared = Uuid::new_v4();
        let merged = merge_documents(
            vec![result(shared, "weighted copy"), result(Uuid::new_v4(), "w2")],
            vec![result(shared, "keyword copy"), result(Uuid::new_v4(), "k2")],
            5,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].title, "weighted copy");
        assert_eq!(merged[2].title, "k2");
    }

    #[test]
    fn test_merge_caps_length() {
        let primary: Vec<_> = (0..4).map(|i| result(Uuid::new_v4(), &format!("p{i}"))).collect();
        let secondary: Vec<_> = (0..4).map(|i| result(Uuid::new_v4(), &format!("s{i}"))).collect();
        let merged = merge_documents(primary, secondary, 5);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[4].title, "s0");
    }

    #[test]
    fn test_check_params() {
        assert!(check_params(1, 0.0).is_ok());
        assert!(check_params(1, 1.0).is_ok());
        assert!(matches!(check_params(0, 0.5), Err(Error::InvalidInput(_))));
        assert!(matches!(check_params(3, 1.5), Err(Error::InvalidInput(_))));
        assert!(matches!(check_params(3, -0.1), Err(Error::InvalidInput(_))));
    }
}
