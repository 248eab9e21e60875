use once_cell::sync::Lazy;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::prompt::Prompts;
use crate::translator::CancelToken;

pub static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        // No overall timeout: streamed completions can legitimately run long.
        .connect_timeout(Duration::from_secs(15))
        .build()
        .expect("failed to build client")
});

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("{0}")]
    Http(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("translation aborted")]
    Cancelled,
    #[error("empty response")]
    EmptyResponse,
}

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Resolves the chat-completions endpoint from a configured base URL.
/// The base has already been stripped of trailing slashes at save time.
pub fn resolve_endpoint(base: &str) -> String {
    let mut endpoint = base.to_string();
    if !endpoint.contains("/chat/completions") {
        if !endpoint.ends_with("/v1") {
            endpoint.push_str("/v1");
        }
        endpoint.push_str("/chat/completions");
    }
    endpoint
}

/// Pulls a human-readable message out of a non-2xx response body, falling
/// back to the bare status code when the body is not the expected shape.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("Status {}", status.as_u16()))
}

/// Issues the chat-completions POST for one attempt and checks the status.
/// Cancellation races the send so a stop request does not wait on the server.
pub async fn send_chat(
    client: &reqwest::Client,
    cfg: &Config,
    prompts: &Prompts,
    token: &CancelToken,
) -> Result<reqwest::Response, TranslateError> {
    let endpoint = resolve_endpoint(&cfg.api_url);
    let body = ChatRequest {
        model: &cfg.model,
        messages: vec![
            ChatMessage { role: "system", content: &prompts.system },
            ChatMessage { role: "user", content: &prompts.user },
        ],
        temperature: cfg.temperature,
        stream: cfg.stream,
    };

    let send = client
        .post(&endpoint)
        .bearer_auth(&cfg.api_key)
        .json(&body)
        .send();

    let resp = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(TranslateError::Cancelled),
        resp = send => resp?,
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(TranslateError::Http(extract_error_message(status, &body)));
    }
    Ok(resp)
}
