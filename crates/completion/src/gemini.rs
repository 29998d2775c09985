use std::env;
use std::time::Duration;

use bestroute_core::CompletionRequest;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{CompletionError, CompletionService};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MAX_ERROR_BODY_LEN: usize = 2_000;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Option<Self> {
        let api_key = env::var("BESTROUTE_GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|value| !value.trim().is_empty())?;
        let model = env::var("BESTROUTE_GEMINI_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let base_url = env::var("BESTROUTE_GEMINI_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());
        let timeout = Duration::from_secs(
            env::var("BESTROUTE_HTTP_TIMEOUT_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(30),
        );

        Some(Self {
            api_key,
            model,
            base_url,
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, CompletionError> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

impl CompletionService for GeminiClient {
    fn backend_name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let payload = generate_content_payload(request);
        debug!(model = %self.config.model, prompt_len = request.prompt.len(), "calling generateContent");

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header("x-goog-api-key", self.config.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_LEN)
                .collect();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        extract_candidate_text(&body)
    }
}

pub(crate) fn generate_content_payload(request: &CompletionRequest) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [ { "text": request.prompt } ]
            }
        ],
        "generationConfig": {
            "responseMimeType": request.response_mime_type,
            "responseSchema": request.response_schema,
        }
    })
}

/// Concatenates the text parts of the first candidate.
pub(crate) fn extract_candidate_text(payload: &Value) -> Result<String, CompletionError> {
    if let Some(reason) = payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        return Err(CompletionError::EmptyOutput {
            reason: format!("prompt blocked: {reason}"),
        });
    }

    let Some(candidate) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        return Err(CompletionError::EmptyOutput {
            reason: "no candidates".to_string(),
        });
    };

    let chunks = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let text = chunks.concat();
    if text.trim().is_empty() {
        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        return Err(CompletionError::EmptyOutput {
            reason: format!("finish reason {finish_reason}"),
        });
    }

    Ok(text)
}
