use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::reject;
use crate::models::{
    ExampleSearchRequest, ExampleSearchResult, RuleSearchRequest, SearchResult, SearchStats,
};
use crate::state::AppState;

/// POST /api/search/rules - Authority-weighted guideline search
pub async fn search_rules(
    State(state): State<AppState>,
    Json(req): Json<RuleSearchRequest>,
) -> Result<Json<Vec<SearchResult>>, (StatusCode, String)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }

    let cfg = state.engine.config();
    let top_k = req.top_k.unwrap_or(cfg.top_k);
    let min_similarity = req.min_similarity.unwrap_or(cfg.min_similarity);

    let results = state
        .engine
        .search_documents_weighted(query, top_k, min_similarity)
        .await
        .map_err(reject)?;

    tracing::info!("Rule search '{query}' → {} results", results.len());
    Ok(Json(results))
}

/// POST /api/search/examples - Similar examples, optionally in one category
pub async fn search_examples(
    State(state): State<AppState>,
    Json(req): Json<ExampleSearchRequest>,
) -> Result<Json<Vec<ExampleSearchResult>>, (StatusCode, String)> {
    if req.code.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Code is required".to_string()));
    }

    let cfg = state.engine.config();
    let top_k = req.top_k.unwrap_or(cfg.top_k);
    let min_similarity = req.min_similarity.unwrap_or(cfg.min_similarity);

    let results = match req.category.as_deref() {
        Some(category) => {
            state
                .engine
                .search_examples_by_category(&req.code, category, top_k, min_similarity)
                .await
        }
        None => state
            .engine
            .search_examples(&req.code, top_k, min_similarity)
            .await
            .map_err(reject)?,
    };

    Ok(Json(results))
}

/// GET /api/search/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<SearchStats>, (StatusCode, String)> {
    state.engine.get_search_stats().await.map(Json).map_err(reject)
}
