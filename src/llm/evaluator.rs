use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Prompt → raw model text. Decoding happens in [`crate::llm::response`].
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, prompt: &str, system_instructions: &str) -> Result<String>;
}

/// Chat-completion evaluator for Ollama or OpenAI-compatible APIs.
pub struct HttpEvaluator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEvaluator {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, prompt: &str, system_instructions: &str) -> Result<String> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_instructions.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ];

        match self.config.provider.as_str() {
            "ollama" => call_ollama(&self.client, &self.config, messages).await,
            "openai" => call_openai(&self.client, &self.config, messages).await,
            other => Err(Error::Evaluation {
                message: format!("Unknown LLM provider: {other}"),
                retryable: false,
            }),
        }
    }
}

/// Call the evaluator, retrying rate-limited failures with exponential
/// backoff (`base`, `2×base`, `4×base`, …). Other failures return at once.
pub async fn evaluate_with_backoff(
    evaluator: &dyn Evaluator,
    prompt: &str,
    system_instructions: &str,
    max_retries: u32,
    base: Duration,
) -> Result<String> {
    let mut attempt = 0u32;
    loop {
        match evaluator.evaluate(prompt, system_instructions).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = base * 2u32.saturating_pow(attempt);
                tracing::warn!(
                    "LLM rate limited (attempt {}/{max_retries}), retrying in {delay:?}: {e}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_checked(request: reqwest::RequestBuilder, provider: &str) -> Result<reqwest::Response> {
    let resp = request.send().await.map_err(|e| Error::Evaluation {
        message: format!("Failed to call {provider} chat API: {e}"),
        retryable: false,
    })?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Evaluation {
            message: format!("{provider} chat API returned {status}: {body}"),
            retryable: status == StatusCode::TOO_MANY_REQUESTS,
        });
    }
    Ok(resp)
}

fn parse_failure(provider: &str, e: reqwest::Error) -> Error {
    Error::Evaluation {
        message: format!("Failed to parse {provider} chat response: {e}"),
        retryable: false,
    }
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);
    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages,
        stream: false,
        format: "json",
    };

    let resp = send_checked(client.post(&url).json(&req), "Ollama").await?;
    let body: OllamaChatResponse = resp.json().await.map_err(|e| parse_failure("Ollama", e))?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages,
        temperature: 0.0,
        response_format: ResponseFormat { kind: "json_object" },
    };

    let request = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req);
    let resp = send_checked(request, "OpenAI").await?;
    let body: OpenAiChatResponse = resp.json().await.map_err(|e| parse_failure("OpenAI", e))?;

    Ok(body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}
