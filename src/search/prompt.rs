//! Prompt assembly for the validation call.
//!
//! Section order is fixed: role, authoritative guidelines, supplementary
//! documents, similar examples, pre-check findings, evaluation criteria,
//! output format. Empty sections are left out. Every document and example
//! is cut to a character budget so prompt size stays bounded.

use std::borrow::Cow;
use std::fmt::Write;

use super::authority::AuthorityLabels;
use crate::models::{ComplianceContext, ExampleSearchResult, SearchResult};

pub const AUTHORITATIVE_DOC_CHARS: usize = 1000;
pub const DOC_CHARS: usize = 800;
pub const EXAMPLE_CHARS: usize = 500;
pub const TRUNCATION_MARKER: &str = "...[truncated]";

pub const ROLE_STATEMENT: &str = "You are an expert reviewer of Python detection rules. \
     Evaluate the submitted rule against the guidelines and reference material below.";

pub const EVALUATION_CRITERIA: &str = "## Evaluation Criteria\n\
     1. Syntax: the code is valid Python 3.\n\
     2. Entry point: a `rule(event)` function is defined and returns a boolean.\n\
     3. Field access: event fields are read with `.get()` or `deep_get()`, never by direct indexing.\n\
     4. Helpers: optional `title`, `dedup`, `severity` and `alert_context` functions are well-formed.\n\
     5. Side effects: no network calls, file I/O or global state mutation.\n\
     6. Readability: clear naming, small functions, comments where logic is non-obvious.\n";

pub const OUTPUT_FORMAT: &str = "## Output Format\n\
     Respond with a single JSON object and nothing else, matching:\n\
     {\"syntax\": {\"is_valid\": bool, \"errors\": [string]}, \
     \"compliance\": {\"score\": 0-100, \"findings\": [string], \"suggestions\": [string]}, \
     \"quality\": {\"score\": 0-100, \"feedback\": markdown string}, \
     \"detailed_analysis\": string}\n\
     Write every free-text field in English.\n";

pub const SYSTEM_INSTRUCTIONS: &str = "You review detection rules and reply with JSON only. \
     Never wrap the JSON in prose.";

/// First `budget` chars of `text`, plus [`TRUNCATION_MARKER`] when cut.
pub fn truncate_with_marker(text: &str, budget: usize) -> Cow<'_, str> {
    match text.char_indices().nth(budget) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
    }
}

/// Build the reference prompt from retrieved material.
///
/// Pre-check findings are only included alongside retrieved context, so an
/// empty retrieval yields just the role, criteria and output instructions.
pub fn build_prompt(
    documents: &[SearchResult],
    examples: &[ExampleSearchResult],
    compliance: Option<&ComplianceContext>,
    labels: &AuthorityLabels,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(ROLE_STATEMENT);
    prompt.push_str("\n\n");

    let (authoritative, supplementary): (Vec<&SearchResult>, Vec<&SearchResult>) =
        documents.iter().partition(|d| labels.is_authoritative(d));

    if !authoritative.is_empty() {
        prompt.push_str("## Authoritative Rule Guidelines\n");
        for doc in authoritative {
            push_document(&mut prompt, doc, AUTHORITATIVE_DOC_CHARS);
        }
    }

    if !supplementary.is_empty() {
        prompt.push_str("## Supplementary Reference Documents\n");
        for doc in supplementary {
            push_document(&mut prompt, doc, DOC_CHARS);
        }
    }

    if !examples.is_empty() {
        prompt.push_str("## Similar Examples\n");
        for ex in examples {
            let _ = writeln!(
                prompt,
                "### {} (quality {}/100, similarity {:.2})",
                ex.title, ex.quality_score, ex.similarity
            );
            if let Some(desc) = &ex.description {
                let _ = writeln!(prompt, "{desc}");
            }
            let _ = writeln!(
                prompt,
                "```python\n{}\n```\n",
                truncate_with_marker(&ex.code, EXAMPLE_CHARS)
            );
        }
    }

    let has_context = !documents.is_empty() || !examples.is_empty();
    if let Some(c) = compliance.filter(|_| has_context) {
        push_precheck(&mut prompt, c);
    }

    prompt.push_str(EVALUATION_CRITERIA);
    prompt.push('\n');
    prompt.push_str(OUTPUT_FORMAT);
    prompt
}

/// Append the code under review to a reference prompt.
pub fn with_code(prompt: &str, code: &str) -> String {
    format!("{prompt}\n## Code Under Review\n```python\n{code}\n```\n")
}

fn push_document(prompt: &mut String, doc: &SearchResult, budget: usize) {
    let section = doc
        .section
        .as_deref()
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    let _ = writeln!(
        prompt,
        "### {}{section} ({}, relevance {:.2})\n{}\n",
        doc.title,
        doc.doc_type.as_str(),
        doc.similarity,
        truncate_with_marker(&doc.content, budget)
    );
}

fn push_precheck(prompt: &mut String, compliance: &ComplianceContext) {
    if compliance.missing_requirements.is_empty() && compliance.suggestions.is_empty() {
        return;
    }
    prompt.push_str("## Automated Pre-check\n");
    let _ = writeln!(prompt, "Heuristic compliance score: {}/100", compliance.score);
    if !compliance.missing_requirements.is_empty() {
        prompt.push_str("Possible gaps:\n");
        for m in &compliance.missing_requirements {
            let _ = writeln!(prompt, "- {m}");
        }
    }
    if !compliance.suggestions.is_empty() {
        prompt.push_str("Best practices from the guidelines:\n");
        for s in &compliance.suggestions {
            let _ = writeln!(prompt, "- {s}");
        }
    }
    prompt.push('\n');
}
