use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::reject;
use crate::ingest::IngestReport;
use crate::models::{CodeExample, DocumentUpdateRequest, ExampleRequest, IngestRequest, KnowledgeDocument};
use crate::state::AppState;

/// POST /api/documents - Chunk, embed and store guideline text
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestReport>), (StatusCode, String)> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }

    let report = state
        .ingestor
        .ingest_text(title, &req.text, req.section.as_deref(), req.doc_type)
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// PUT /api/documents/:id - Replace a document's content and re-embed it
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DocumentUpdateRequest>,
) -> Result<Json<KnowledgeDocument>, (StatusCode, String)> {
    let mut doc = state
        .ingestor
        .update_document_content(id, &req.content)
        .await
        .map_err(reject)?;
    doc.embedding = None;
    Ok(Json(doc))
}

/// DELETE /api/documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.ingestor.delete_document(id).await.map_err(reject)?;
    tracing::info!("Deleted document {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/examples
pub async fn add_example(
    State(state): State<AppState>,
    Json(req): Json<ExampleRequest>,
) -> Result<(StatusCode, Json<CodeExample>), (StatusCode, String)> {
    let example = state.ingestor.add_example(req).await.map_err(reject)?;
    tracing::info!("Added example '{}' ({})", example.title, example.id);
    Ok((StatusCode::CREATED, Json(without_embedding(example))))
}

/// PUT /api/examples/:id - Replace an example, re-embedding changed code
pub async fn update_example(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExampleRequest>,
) -> Result<Json<CodeExample>, (StatusCode, String)> {
    let example = state.ingestor.update_example(id, req).await.map_err(reject)?;
    Ok(Json(without_embedding(example)))
}

/// DELETE /api/examples/:id
pub async fn delete_example(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.ingestor.delete_example(id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Vectors are large and meaningless to API clients.
fn without_embedding(mut example: CodeExample) -> CodeExample {
    example.embedding = None;
    example
}
