//! Axum handlers. Errors are returned as `(StatusCode, String)` except for
//! validation, which answers with a structured `{ error, step }` body.

pub mod records;
pub mod search;
pub mod validate;

use axum::http::StatusCode;

use crate::error::Error;

pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Evaluation { retryable: true, .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Embedding(e) if e.is_retryable() => StatusCode::TOO_MANY_REQUESTS,
        Error::Embedding(_)
        | Error::Evaluation { .. }
        | Error::ResponseParse(_)
        | Error::SchemaValidation(_) => StatusCode::BAD_GATEWAY,
        Error::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(err: Error) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {err}");
    }
    (status, err.to_string())
}
