use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{ValidateRequest, ValidationFailure, ValidationOutcome, ValidationStep};
use crate::state::AppState;

/// POST /api/validate - Validate a detection rule.
///
/// Failures answer with `{ error, step }` so the caller can tell a bad
/// request from a model outage or an unusable reply.
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidationOutcome>, (StatusCode, Json<ValidationFailure>)> {
    match state.validator.validate(&req.code, req.use_rag).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            let status = match e.step {
                ValidationStep::Input => StatusCode::BAD_REQUEST,
                ValidationStep::Evaluation | ValidationStep::Parse => super::status_for(&e.source),
            };
            tracing::warn!("{e}");
            Err((status, Json(e.to_failure())))
        }
    }
}
