mod gemini;
mod scripted;

use bestroute_core::CompletionRequest;
use thiserror::Error;

pub use gemini::{GeminiClient, GeminiConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use scripted::{ScriptedCompletion, ScriptedReply};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion backend not configured")]
    NotConfigured,
    #[error("completion transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion service returned no text ({reason})")]
    EmptyOutput { reason: String },
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

/// Text-completion capability: prompt plus output schema in, raw text out.
pub trait CompletionService: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Clone)]
pub enum CompletionBackend {
    Gemini(GeminiClient),
    Scripted(ScriptedCompletion),
    Unconfigured,
}

impl CompletionBackend {
    pub fn gemini(config: GeminiConfig) -> Result<Self, CompletionError> {
        Ok(Self::Gemini(GeminiClient::new(config)?))
    }

    pub fn scripted(completion: ScriptedCompletion) -> Self {
        Self::Scripted(completion)
    }

    /// Scripted reply file wins over a Gemini key; neither leaves the backend unconfigured.
    pub fn from_env() -> Result<Self, CompletionError> {
        if let Some(path) = std::env::var("BESTROUTE_SCRIPTED_REPLY_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
        {
            let reply = std::fs::read_to_string(&path).map_err(|error| {
                CompletionError::Unavailable(format!("cannot read scripted reply {path}: {error}"))
            })?;
            return Ok(Self::Scripted(ScriptedCompletion::always(reply)));
        }

        match GeminiConfig::from_env() {
            Some(config) => Self::gemini(config),
            None => {
                tracing::warn!("no Gemini API key found; route searches will fail");
                Ok(Self::Unconfigured)
            }
        }
    }
}

impl CompletionService for CompletionBackend {
    fn backend_name(&self) -> &'static str {
        match self {
            CompletionBackend::Gemini(client) => client.backend_name(),
            CompletionBackend::Scripted(stub) => stub.backend_name(),
            CompletionBackend::Unconfigured => "unconfigured",
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        match self {
            CompletionBackend::Gemini(client) => client.complete(request).await,
            CompletionBackend::Scripted(stub) => stub.complete(request).await,
            CompletionBackend::Unconfigured => Err(CompletionError::NotConfigured),
        }
    }
}
