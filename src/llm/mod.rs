pub mod client;
pub mod gemini;

use std::time::Duration;

use thiserror::Error;

pub use client::LlmClient;
pub use gemini::GeminiProvider;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerateRequest {
    /// Bytes sent as instructions plus user text.
    pub fn payload_len(&self) -> usize {
        self.system.len() + self.prompt.len()
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
}

/// Classified failure of a generation call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unexpected API failure: {0}")]
    Unknown(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient(_) | ApiError::RateLimit { .. })
    }

    /// Stable label used for spans, metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidPrompt(_) => "invalid_prompt",
            ApiError::Auth(_) => "auth_error",
            ApiError::RateLimit { .. } => "rate_limit",
            ApiError::Transient(_) => "transient",
            ApiError::Unknown(_) => "unknown_error",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, ApiError>;
    fn name(&self) -> &str;
    /// Host reported as `server.address` on client spans.
    fn server_address(&self) -> &str {
        "unknown"
    }
}
