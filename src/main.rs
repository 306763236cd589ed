use axum::routing::{get, post, put};
use axum::Router;
use tracing_subscriber::EnvFilter;

use rule_validator::api;
use rule_validator::config::Config;
use rule_validator::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "LLM provider: {} ({}), embeddings {} @ {} dims",
        config.llm.provider,
        config.llm.base_url,
        config.llm.embedding_model,
        config.llm.embedding_dim
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/validate", post(api::validate::validate))
        .route("/api/search/rules", post(api::search::search_rules))
        .route("/api/search/examples", post(api::search::search_examples))
        .route("/api/search/stats", get(api::search::stats))
        .route("/api/documents", post(api::records::ingest_document))
        .route(
            "/api/documents/{id}",
            put(api::records::update_document).delete(api::records::delete_document),
        )
        .route("/api/examples", post(api::records::add_example))
        .route(
            "/api/examples/{id}",
            put(api::records::update_example).delete(api::records::delete_example),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
