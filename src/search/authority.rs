//! Authority weighting: a fixed multiplier that lets canonical sources
//! outrank loosely related notes with a slightly higher cosine score.

use crate::models::{DocumentType, SearchResult};

pub const RULE_SECTION_WEIGHT: f32 = 1.3;
pub const GUIDE_SECTION_WEIGHT: f32 = 1.2;
pub const RULE_TYPE_WEIGHT: f32 = 1.1;
pub const BASE_WEIGHT: f32 = 1.0;

/// Section labels treated as canonical.
#[derive(Debug, Clone)]
pub struct AuthorityLabels {
    pub rule_section: String,
    pub guide_section: String,
}

impl AuthorityLabels {
    pub fn new(rule_section: impl Into<String>, guide_section: impl Into<String>) -> Self {
        Self {
            rule_section: rule_section.into(),
            guide_section: guide_section.into(),
        }
    }

    /// Multiplier for a document. Always >= 1.0.
    pub fn weight(&self, section: Option<&str>, doc_type: DocumentType) -> f32 {
        let is_rule = doc_type == DocumentType::Rule;
        match section {
            Some(s) if s == self.rule_section && is_rule => RULE_SECTION_WEIGHT,
            Some(s) if s == self.guide_section => GUIDE_SECTION_WEIGHT,
            _ if is_rule => RULE_TYPE_WEIGHT,
            _ => BASE_WEIGHT,
        }
    }

    pub fn is_authoritative(&self, result: &SearchResult) -> bool {
        self.weight(result.section.as_deref(), result.doc_type) > BASE_WEIGHT
    }

    /// Replace each raw similarity with its weighted score and sort
    /// descending. Ties fall back to raw similarity, then input order.
    pub fn rerank(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut weighted: Vec<(f32, SearchResult)> = results
            .into_iter()
            .map(|mut r| {
                let raw = r.similarity;
                r.similarity = raw * self.weight(r.section.as_deref(), r.doc_type);
                (raw, r)
            })
            .collect();

        weighted.sort_by(|(raw_a, a), (raw_b, b)| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| raw_b.partial_cmp(raw_a).unwrap_or(std::cmp::Ordering::Equal))
        });

        weighted.into_iter().map(|(_, r)| r).collect()
    }
}
