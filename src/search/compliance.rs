//! Rule-based compliance pre-score.
//!
//! Pattern presence only, no parsing. False positives and negatives are
//! expected; the score biases the prompt and is never used as a gate.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ComplianceContext, SearchResult};

pub const MISSING_RULE_FUNCTION: &str = "rule function missing";
pub const MISSING_SAFE_ACCESSOR: &str = "unsafe/missing accessor usage";
pub const MISSING_BOOLEAN_RETURN: &str = "explicit boolean return missing";

const RULE_FUNCTION_PENALTY: u8 = 30;
const SAFE_ACCESSOR_PENALTY: u8 = 15;
const BOOLEAN_RETURN_PENALTY: u8 = 20;

const MAX_SUGGESTIONS: usize = 5;

static RULE_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*def\s+rule\s*\(").expect("valid regex"));
static SAFE_ACCESSOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.get\s*\(|\bdeep_get\s*\(").expect("valid regex"));
static BOOLEAN_RETURN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breturn\s+(True|False)\b").expect("valid regex"));
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?](\s+|$)|\n+").expect("valid regex"));
static OBLIGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(should|must|recommended)\b").expect("valid regex"));

/// Score `code` against the fixed checks and pull best-practice sentences
/// out of `documents`.
pub fn estimate_compliance(code: &str, documents: &[SearchResult]) -> ComplianceContext {
    let checks = [
        (&*RULE_FUNCTION, RULE_FUNCTION_PENALTY, MISSING_RULE_FUNCTION),
        (&*SAFE_ACCESSOR, SAFE_ACCESSOR_PENALTY, MISSING_SAFE_ACCESSOR),
        (&*BOOLEAN_RETURN, BOOLEAN_RETURN_PENALTY, MISSING_BOOLEAN_RETURN),
    ];

    let mut score: u8 = 100;
    let mut missing_requirements = Vec::new();
    for (pattern, penalty, label) in checks {
        if !pattern.is_match(code) {
            score = score.saturating_sub(penalty);
            missing_requirements.push(label.to_string());
        }
    }

    ComplianceContext {
        missing_requirements,
        score,
        suggestions: extract_best_practices(documents),
    }
}

/// Up to five distinct sentences carrying an obligation word, in document order.
pub fn extract_best_practices(documents: &[SearchResult]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for doc in documents {
        for sentence in SENTENCE_BREAK.split(&doc.content) {
            let sentence = sentence.trim();
            if sentence.is_empty() || !OBLIGATION.is_match(sentence) {
                continue;
            }
            if !out.iter().any(|s| s == sentence) {
                out.push(sentence.to_string());
            }
            if out.len() == MAX_SUGGESTIONS {
                return out;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use uuid::Uuid;

    fn doc(content: &str) -> SearchResult {
        SearchResult {
            id: Uuid::new_v4(),
            title: "guide".into(),
            content: content.into(),
            section: None,
            doc_type: DocumentType::BestPractice,
            similarity: 0.8,
            metadata: None,
        }
    }

    const GOOD_RULE: &str = "def rule(event):\n    if event.get('eventName') == 'ConsoleLogin':\n        return True\n    return False\n";

    #[test]
    fn test_compliant_rule_scores_100() {
        let ctx = estimate_compliance(GOOD_RULE, &[]);
        assert_eq!(ctx.score, 100);
        assert!(ctx.missing_requirements.is_empty());
    }

    #[test]
    fn test_all_checks_missing_scores_35() {
        let code = "def detect(e):\n    x = e['user']\n    return x == 'root'\n";
        let ctx = estimate_compliance(code, &[]);
        assert_eq!(ctx.score, 35);
        assert_eq!(ctx.missing_requirements.len(), 3);
        assert_eq!(
            ctx.missing_requirements,
            vec![MISSING_RULE_FUNCTION, MISSING_SAFE_ACCESSOR, MISSING_BOOLEAN_RETURN]
        );
    }

    #[test]
    fn test_empty_code_stays_in_range() {
        let ctx = estimate_compliance("", &[]);
        assert_eq!(ctx.score, 35);
        assert!(ctx.score <= 100);
    }

    #[test]
    fn test_individual_penalties() {
        let no_accessor = "def rule(event):\n    return True\n";
        assert_eq!(estimate_compliance(no_accessor, &[]).score, 85);

        let no_bool = "def rule(event):\n    return event.get('x') == 1\n";
        assert_eq!(estimate_compliance(no_bool, &[]).score, 80);

        let deep_get = "from helpers import deep_get\ndef rule(event):\n    if deep_get(event, 'a', 'b'):\n        return True\n    return False";
        assert_eq!(estimate_compliance(deep_get, &[]).score, 100);
    }

    #[test]
    fn test_rule_must_be_a_definition() {
        // Calling rule() is not defining it
        let code = "result = rule(event)\nreturn True if event.get('a') else False";
        let ctx = estimate_compliance(code, &[]);
        assert!(ctx.missing_requirements.contains(&MISSING_RULE_FUNCTION.to_string()));
    }

    #[test]
    fn test_suggestions_pick_obligation_sentences() {
        let docs = [
            doc("Rules must return a boolean. The title is shown in alerts. Use deep_get for nested fields, it is recommended."),
            doc("You SHOULD keep rules short.\nAvoid network calls."),
        ];
        let ctx = estimate_compliance(GOOD_RULE, &docs);
        assert_eq!(
            ctx.suggestions,
            vec![
                "Rules must return a boolean",
                "Use deep_get for nested fields, it is recommended",
                "You SHOULD keep rules short",
            ]
        );
    }

    #[test]
    fn test_suggestions_capped_and_deduplicated() {
        let text = (0..10).map(|i| format!("Rule {i} should pass.")).collect::<Vec<_>>().join(" ");
        let docs = [doc("You must test rules."), doc("You must test rules."), doc(&text)];
        let suggestions = extract_best_practices(&docs);
        assert_eq!(suggestions.len(), 5);
        assert_eq!(suggestions[0], "You must test rules");
        assert_eq!(suggestions[1], "Rule 0 should pass");
    }
}
