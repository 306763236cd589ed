//! End-to-end validation: retrieve context, ask the evaluator, decode the
//! verdict, and keep track of which records informed it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::Error;
use crate::llm::response::parse_validation_response;
use crate::llm::{evaluate_with_backoff, Evaluator};
use crate::models::{ValidationFailure, ValidationOutcome, ValidationStep};
use crate::search::prompt::{build_prompt, with_code, SYSTEM_INSTRUCTIONS};
use crate::search::RetrievalEngine;

/// A pipeline error tagged with the stage that produced it.
#[derive(Debug, thiserror::Error)]
#[error("validation failed during {step:?}: {source}")]
pub struct StepError {
    pub step: ValidationStep,
    pub source: Error,
}

impl StepError {
    fn new(step: ValidationStep, source: Error) -> Self {
        Self { step, source }
    }

    pub fn to_failure(&self) -> ValidationFailure {
        ValidationFailure {
            error: self.source.to_string(),
            step: self.step,
        }
    }
}

pub struct Validator {
    engine: Arc<RetrievalEngine>,
    evaluator: Arc<dyn Evaluator>,
    max_retries: u32,
    base_backoff: Duration,
}

impl Validator {
    pub fn new(engine: Arc<RetrievalEngine>, evaluator: Arc<dyn Evaluator>, config: &IngestConfig) -> Self {
        Self {
            engine,
            evaluator,
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        }
    }

    /// Validate one rule.
    ///
    /// With `use_rag`, retrieval failures degrade to the static prompt and
    /// `rag_used` comes back false. Evaluation and decoding failures are
    /// returned with their step; no partial outcome is produced.
    pub async fn validate(&self, code: &str, use_rag: bool) -> Result<ValidationOutcome, StepError> {
        let started = Instant::now();

        if code.trim().is_empty() {
            return Err(StepError::new(
                ValidationStep::Input,
                Error::InvalidInput("code is empty".to_string()),
            ));
        }

        let context = if use_rag {
            match self.engine.build_enhanced_context(code).await {
                Ok(ctx) => Some(ctx),
                Err(e) => {
                    tracing::warn!("Retrieval failed, validating without RAG: {e}");
                    None
                }
            }
        } else {
            None
        };

        let reference = match &context {
            Some(ctx) => ctx.prompt.clone(),
            None => build_prompt(&[], &[], None, self.engine.labels()),
        };
        let prompt = with_code(&reference, code);

        let raw = evaluate_with_backoff(
            self.evaluator.as_ref(),
            &prompt,
            SYSTEM_INSTRUCTIONS,
            self.max_retries,
            self.base_backoff,
        )
        .await
        .map_err(|e| StepError::new(ValidationStep::Evaluation, e))?;

        let report = parse_validation_response(&raw).map_err(|e| StepError::new(ValidationStep::Parse, e))?;

        let (document_ids, example_ids, compliance_precheck) = match context {
            Some(ctx) => (
                ctx.relevant_documents.iter().map(|d| d.id).collect(),
                ctx.similar_examples.iter().map(|e| e.id).collect(),
                ctx.compliance,
            ),
            None => (Vec::new(), Vec::new(), None),
        };

        let outcome = ValidationOutcome {
            id: Uuid::new_v4(),
            rag_used: compliance_precheck.is_some(),
            report,
            compliance_precheck,
            document_ids,
            example_ids,
            processing_time_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        };

        tracing::info!(
            "Validated rule: syntax valid={}, compliance {}/100, quality {}/100, rag={} ({}ms)",
            outcome.report.syntax.is_valid,
            outcome.report.compliance.score,
            outcome.report.quality.score,
            outcome.rag_used,
            outcome.processing_time_ms
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::error::{EmbeddingError, EmbeddingErrorKind, Result};
    use crate::llm::Embedder;
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const DIM: usize = 4;

    const REPORT: &str = r#"{
        "syntax": {"is_valid": true, "errors": []},
        "compliance": {"score": 90, "findings": [], "suggestions": []},
        "quality": {"score": 85, "feedback": "Looks good."},
        "detailed_analysis": "Fine."
    }"#;

    struct FixedEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::new(EmbeddingErrorKind::Network, "down"));
            }
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Replays canned replies and records the prompts it was given.
    struct ScriptedEvaluator {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedEvaluator {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn evaluate(&self, prompt: &str, _system: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            self.replies.lock().remove(0)
        }
    }

    fn validator(embed_fails: bool, evaluator: Arc<ScriptedEvaluator>) -> Validator {
        let engine = RetrievalEngine::new(
            Arc::new(FixedEmbedder { fail: embed_fails }),
            Arc::new(MemoryVectorStore::new(DIM)),
            RetrievalConfig::default(),
        );
        let config = IngestConfig {
            embed_delay_ms: 0,
            max_retries: 2,
            base_backoff_ms: 1,
        };
        Validator::new(Arc::new(engine), evaluator, &config)
    }

    const CODE: &str = "def rule(event):\n    return event.get('x') == 1";

    #[tokio::test]
    async fn test_empty_code_rejected_at_input() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![]));
        let err = validator(false, eval.clone()).validate("   ", true).await.unwrap_err();
        assert_eq!(err.step, ValidationStep::Input);
        assert!(eval.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_successful_validation_with_empty_store() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![Ok(REPORT.to_string())]));
        let outcome = validator(false, eval.clone()).validate(CODE, true).await.unwrap();

        assert!(outcome.rag_used);
        assert!(outcome.document_ids.is_empty());
        assert_eq!(outcome.report.compliance.score, 90);
        assert!(outcome.compliance_precheck.is_some());

        let prompts = eval.prompts.lock();
        assert!(prompts[0].contains("## Code Under Review"));
        assert!(prompts[0].contains("return event.get('x') == 1"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_falls_back_to_static_prompt() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![Ok(REPORT.to_string())]));
        let outcome = validator(true, eval).validate(CODE, true).await.unwrap();
        assert!(!outcome.rag_used);
        assert!(outcome.compliance_precheck.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_reply_fails_at_parse() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![Ok("I think it is fine".to_string())]));
        let err = validator(false, eval).validate(CODE, false).await.unwrap_err();
        assert_eq!(err.step, ValidationStep::Parse);
        assert!(matches!(err.source, Error::ResponseParse(_)));
        assert_eq!(err.to_failure().step, ValidationStep::Parse);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![
            Err(Error::Evaluation {
                message: "429".into(),
                retryable: true,
            }),
            Ok(REPORT.to_string()),
        ]));
        let outcome = validator(false, eval.clone()).validate(CODE, false).await.unwrap();
        assert!(!outcome.rag_used);
        assert_eq!(eval.prompts.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_evaluation_error() {
        let eval = Arc::new(ScriptedEvaluator::new(vec![Err(Error::Evaluation {
            message: "bad key".into(),
            retryable: false,
        })]));
        let err = validator(false, eval.clone()).validate(CODE, false).await.unwrap_err();
        assert_eq!(err.step, ValidationStep::Evaluation);
        assert_eq!(eval.prompts.lock().len(), 1);
    }
}
