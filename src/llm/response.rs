//! Decoding of the LLM's validation verdict.
//!
//! The model is asked for bare JSON but often wraps it in prose or a code
//! fence. We first pull out a JSON object, then decode it against the strict
//! [`ValidationReport`] schema, then against a fixed list of named
//! alternative shapes. Anything else is a schema error; nothing is coerced.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{ComplianceCheck, QualityCheck, SyntaxCheck, ValidationReport};

/// Raw text is echoed into parse errors up to this many chars.
const RAW_ECHO_CHARS: usize = 500;

/// Pull one JSON object out of free-form model output.
pub fn extract_json_object(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(v);
    }

    // Outermost braces, which also covers ```json fences
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok(v);
            }
        }
    }

    let echo: String = trimmed.chars().take(RAW_ECHO_CHARS).collect();
    Err(Error::ResponseParse(echo))
}

/// `{ "result": { …strict report… } }`
#[derive(Deserialize)]
struct WrappedReport {
    result: ValidationReport,
}

/// Older single-level layout.
#[derive(Deserialize)]
struct FlatReport {
    is_valid: bool,
    #[serde(default)]
    errors: Vec<String>,
    compliance_score: u8,
    #[serde(default)]
    findings: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    quality_score: u8,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    detailed_analysis: String,
}

impl From<FlatReport> for ValidationReport {
    fn from(flat: FlatReport) -> Self {
        ValidationReport {
            syntax: SyntaxCheck {
                is_valid: flat.is_valid,
                errors: flat.errors,
            },
            compliance: ComplianceCheck {
                score: flat.compliance_score,
                findings: flat.findings,
                suggestions: flat.suggestions,
            },
            quality: QualityCheck {
                score: flat.quality_score,
                feedback: flat.feedback,
            },
            detailed_analysis: flat.detailed_analysis,
        }
    }
}

/// Which shape a response decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Strict,
    Wrapped,
    Flat,
}

/// Decode a JSON value against the accepted shapes, in order.
pub fn decode_report(value: Value) -> Result<(ValidationReport, ResponseShape)> {
    let (report, shape) = if let Ok(r) = ValidationReport::deserialize(&value) {
        (r, ResponseShape::Strict)
    } else if let Ok(w) = WrappedReport::deserialize(&value) {
        (w.result, ResponseShape::Wrapped)
    } else if let Ok(f) = FlatReport::deserialize(&value) {
        (f.into(), ResponseShape::Flat)
    } else {
        let keys: Vec<&str> = value
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        return Err(Error::SchemaValidation(format!(
            "no accepted shape matches object with keys {keys:?}"
        )));
    };

    check_scores(&report)?;
    Ok((report, shape))
}

fn check_scores(report: &ValidationReport) -> Result<()> {
    for (name, score) in [
        ("compliance", report.compliance.score),
        ("quality", report.quality.score),
    ] {
        if score > 100 {
            return Err(Error::SchemaValidation(format!(
                "{name} score {score} is outside 0..=100"
            )));
        }
    }
    Ok(())
}

/// Extract + decode in one step.
pub fn parse_validation_response(content: &str) -> Result<ValidationReport> {
    let value = extract_json_object(content)?;
    let (report, shape) = decode_report(value)?;
    if shape != ResponseShape::Strict {
        tracing::debug!("Validation response decoded via {shape:?} shape");
    }
    Ok(report)
}
