use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of knowledge document. Serialized as `rule`, `best-practice`, `example`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Rule,
    BestPractice,
    Example,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Rule => "rule",
            DocumentType::BestPractice => "best-practice",
            DocumentType::Example => "example",
        }
    }
}

/// A chunk of guideline text stored with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub section: Option<String>,
    pub doc_type: DocumentType,
    /// `None` until embedded; such documents never match a similarity search.
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A reference rule implementation with a curated quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExample {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    /// 0..=100, checked on every write.
    pub quality_score: u8,
    pub category: Option<String>,
    pub description: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// A knowledge document hit. `similarity` may carry an authority weight,
/// in which case it is no longer a true cosine value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub section: Option<String>,
    pub doc_type: DocumentType,
    pub similarity: f32,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExampleSearchResult {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    pub quality_score: u8,
    pub category: Option<String>,
    pub description: Option<String>,
    pub similarity: f32,
    pub tags: Option<Vec<String>>,
}

/// Cheap rule-based pre-score computed before the LLM call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComplianceContext {
    pub missing_requirements: Vec<String>,
    pub score: u8,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchMetadata {
    pub documents_found: usize,
    pub examples_found: usize,
    pub processing_time_ms: u64,
}

/// Everything retrieved for one validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub relevant_documents: Vec<SearchResult>,
    pub similar_examples: Vec<ExampleSearchResult>,
    pub prompt: String,
    pub metadata: SearchMetadata,
    pub compliance: Option<ComplianceContext>,
}

/// Aggregate counts over both collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchStats {
    pub total_documents: usize,
    pub embedded_documents: usize,
    pub total_examples: usize,
    pub embedded_examples: usize,
    pub documents_by_type: BTreeMap<String, usize>,
    pub examples_by_category: BTreeMap<String, usize>,
    pub average_quality_score: Option<f32>,
}

/// Structured verdict returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub syntax: SyntaxCheck,
    pub compliance: ComplianceCheck,
    pub quality: QualityCheck,
    pub detailed_analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntaxCheck {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceCheck {
    pub score: u8,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityCheck {
    pub score: u8,
    /// Markdown.
    pub feedback: String,
}

/// A finished validation with provenance links to the retrieved records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub id: Uuid,
    pub report: ValidationReport,
    pub compliance_precheck: Option<ComplianceContext>,
    pub document_ids: Vec<Uuid>,
    pub example_ids: Vec<Uuid>,
    pub rag_used: bool,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Pipeline stage a validation request failed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStep {
    Input,
    Evaluation,
    Parse,
}

/// Error payload returned instead of a partial result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationFailure {
    pub error: String,
    pub step: ValidationStep,
}

// ─── API request types ───────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    #[serde(default = "default_true")]
    pub use_rag: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExampleSearchRequest {
    pub code: String,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub title: String,
    pub text: String,
    pub section: Option<String>,
    pub doc_type: DocumentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpdateRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExampleRequest {
    pub title: String,
    pub code: String,
    pub quality_score: i64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_serializes_kebab_case() {
        let json = serde_json::to_value(DocumentType::BestPractice).unwrap();
        assert_eq!(json, "best-practice");
        assert_eq!(DocumentType::BestPractice.as_str(), "best-practice");
    }

    #[test]
    fn test_validation_step_serializes_snake_case() {
        let failure = ValidationFailure {
            error: "boom".into(),
            step: ValidationStep::Evaluation,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["step"], "evaluation");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_validate_request_defaults_to_rag() {
        let req: ValidateRequest = serde_json::from_str(r#"{"code": "def rule(e): pass"}"#).unwrap();
        assert!(req.use_rag);
    }
}
