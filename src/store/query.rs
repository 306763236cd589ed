use crate::models::{CodeExample, KnowledgeDocument};

/// Exact-match filters that compose with the nearest-neighbour predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Example `category`, or the `category` metadata key of a document.
    CategoryEquals(String),
    /// Raw text contains at least one of the markers (case-sensitive).
    ContentContainsAny(Vec<String>),
}

/// A cosine-distance query: rows with `distance <= max_distance`, ascending,
/// at most `limit`, every predicate satisfied.
#[derive(Debug, Clone)]
pub struct NearestQuery {
    pub vector: Vec<f32>,
    pub max_distance: f32,
    pub limit: usize,
    pub predicates: Vec<Predicate>,
}

impl NearestQuery {
    /// Unbounded distance (cosine distance never exceeds 2.0).
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector,
            max_distance: 2.0,
            limit,
            predicates: Vec::new(),
        }
    }

    /// Similarity-threshold predicate: `distance <= 1 - min_similarity`.
    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.max_distance = 1.0 - min_similarity;
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn category(self, category: impl Into<String>) -> Self {
        self.filter(Predicate::CategoryEquals(category.into()))
    }

    pub fn content_contains_any<I, S>(self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter(Predicate::ContentContainsAny(
            markers.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn matches<T: Filterable>(&self, record: &T) -> bool {
        self.predicates.iter().all(|p| record.satisfies(p))
    }
}

/// A record the store can evaluate predicates against.
pub trait Filterable {
    fn satisfies(&self, predicate: &Predicate) -> bool;
}

impl Filterable for KnowledgeDocument {
    fn satisfies(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::CategoryEquals(category) => self
                .metadata
                .get("category")
                .and_then(|v| v.as_str())
                .is_some_and(|c| c == category),
            Predicate::ContentContainsAny(markers) => {
                markers.iter().any(|m| self.content.contains(m.as_str()))
            }
        }
    }
}

impl Filterable for CodeExample {
    fn satisfies(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::CategoryEquals(category) => {
                self.category.as_deref() == Some(category.as_str())
            }
            Predicate::ContentContainsAny(markers) => {
                markers.iter().any(|m| self.code.contains(m.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use chrono::Utc;
    use uuid::Uuid;

    fn doc(content: &str, category: Option<&str>) -> KnowledgeDocument {
        let mut metadata = serde_json::Map::new();
        if let Some(c) = category {
            metadata.insert("category".into(), c.into());
        }
        KnowledgeDocument {
            id: Uuid::new_v4(),
            title: "t".into(),
            content: content.into(),
            section: None,
            doc_type: DocumentType::BestPractice,
            embedding: None,
            metadata,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_min_similarity_sets_distance_ceiling() {
        let q = NearestQuery::new(vec![1.0], 3).min_similarity(0.75);
        assert!((q.max_distance - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_predicates_compose_as_conjunction() {
        let q = NearestQuery::new(vec![1.0], 3)
            .category("aws")
            .content_contains_any(["def rule("]);
        assert!(q.matches(&doc("def rule(event): return True", Some("aws"))));
        assert!(!q.matches(&doc("def rule(event): return True", Some("gcp"))));
        assert!(!q.matches(&doc("def rule(event): return True", None)));
        assert!(!q.matches(&doc("prose only", Some("aws"))));
    }

    #[test]
    fn test_example_category_predicate() {
        let ex = CodeExample {
            id: Uuid::new_v4(),
            title: "t".into(),
            code: "def rule(e): return True".into(),
            quality_score: 90,
            category: Some("aws".into()),
            description: None,
            embedding: None,
            tags: None,
            created_at: Utc::now(),
        };
        assert!(ex.satisfies(&Predicate::CategoryEquals("aws".into())));
        assert!(!ex.satisfies(&Predicate::CategoryEquals("gcp".into())));
        assert!(ex.satisfies(&Predicate::ContentContainsAny(vec!["def rule(".into()])));
    }
}
