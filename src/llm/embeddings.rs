use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{EmbeddingError, EmbeddingErrorKind};

/// Maximum characters sent per text to the embedding API.
/// text-embedding-3-small takes 8 191 tokens; prose and Python average
/// well over 2 chars per token, so 8 000 chars stays under the limit.
pub const MAX_EMBED_CHARS: usize = 8_000;

/// Collapse every whitespace run (newlines included) to one space, trim,
/// and cap at [`MAX_EMBED_CHARS`] characters. Idempotent.
pub fn preprocess(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_EMBED_CHARS).collect();
    capped.trim_end().to_string()
}

/// Text → fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Normalization applied before every `embed` call.
    fn preprocess(&self, text: &str) -> String {
        preprocess(text)
    }

    /// Embed already-preprocessed text. The vector length always equals
    /// [`Embedder::dimension`]; anything else is a `DimensionMismatch`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;
}

/// Embedding client for Ollama or OpenAI-compatible APIs.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, text).await?,
            "openai" => embed_openai(&self.client, &self.config, text).await?,
            other => {
                return Err(EmbeddingError::new(
                    EmbeddingErrorKind::InvalidResponse,
                    format!("Unknown LLM provider: {other}"),
                ))
            }
        };

        if vector.len() != self.config.embedding_dim {
            return Err(EmbeddingError::dimension_mismatch(
                self.config.embedding_dim,
                vector.len(),
            ));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Map a non-success HTTP status onto an error kind.
fn classify_status(status: StatusCode) -> EmbeddingErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingErrorKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => EmbeddingErrorKind::RateLimited,
        s if s.is_server_error() => EmbeddingErrorKind::Network,
        _ => EmbeddingErrorKind::InvalidResponse,
    }
}

async fn send_checked(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<reqwest::Response, EmbeddingError> {
    let resp = request.send().await.map_err(|e| {
        EmbeddingError::new(
            EmbeddingErrorKind::Network,
            format!("Failed to call {provider} embed API: {e}"),
        )
    })?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(EmbeddingError::new(
            classify_status(status),
            format!("{provider} embed API returned {status}: {body}"),
        ));
    }
    Ok(resp)
}

fn parse_failure(provider: &str, e: reqwest::Error) -> EmbeddingError {
    EmbeddingError::new(
        EmbeddingErrorKind::InvalidResponse,
        format!("Failed to parse {provider} embed response: {e}"),
    )
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>, EmbeddingError> {
    let url = format!("{}/api/embed", config.base_url);
    let req = OllamaEmbedRequest {
        model: &config.embedding_model,
        input: vec![text],
        truncate: true,
    };

    let resp = send_checked(client.post(&url).json(&req), "Ollama").await?;
    let body: OllamaEmbedResponse = resp.json().await.map_err(|e| parse_failure("Ollama", e))?;

    body.embeddings.into_iter().next().ok_or_else(|| {
        EmbeddingError::new(EmbeddingErrorKind::InvalidResponse, "No embedding returned")
    })
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    text: &str,
) -> Result<Vec<f32>, EmbeddingError> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiEmbedRequest {
        model: &config.embedding_model,
        input: vec![text],
    };

    let request = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req);
    let resp = send_checked(request, "OpenAI").await?;
    let body: OpenAiEmbedResponse = resp.json().await.map_err(|e| parse_failure("OpenAI", e))?;

    body.data.into_iter().next().map(|d| d.embedding).ok_or_else(|| {
        EmbeddingError::new(EmbeddingErrorKind::InvalidResponse, "No embedding returned")
    })
}
