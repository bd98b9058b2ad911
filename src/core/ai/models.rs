use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: Some(1000),
        }
    }
}

/// Final response after the fallback chain found a working backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    pub answer: String,
    /// Name of the tier that answered.
    pub provider: String,
    pub model: String,
}

/// How a single backend call failed.
///
/// Only the distinction between rate limits and everything else matters to
/// the fallback chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP 429 or a provider-specific quota signal.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// Timeouts, 5xx, malformed responses, network errors.
    #[error("request failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum AiError {
    /// Every tier and model was skipped or failed. The message is safe to
    /// show to end users.
    #[error("All AI providers are currently unavailable. Please try again later.")]
    AllProvidersUnavailable,
}
