//! LLM access for document analysis.
//!
//! [`LanguageModel`] is the seam between the pipeline and a provider. The
//! production implementation is [`GeminiClient`]; tests substitute scripted fakes.
//! [`LlmInvoker`] wraps any model with a bounded [`RetryPolicy`].

mod client;
mod retry;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{GeminiClient, LlmConfig, ModelInfo};
pub use retry::{InvokeError, LlmInvoker, RetryPolicy};

/// Errors that can occur during LLM operations.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Failed to connect to the LLM service (DNS, TLS, timeout, reset).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Rate limit or quota exhausted.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// API returned an error status not covered by a more specific variant.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Request was malformed; resending it can't help.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// API key missing, invalid or lacking permission.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Model not available to this key.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Provider refused to answer for safety reasons.
    #[error("Response blocked: {0}")]
    Blocked(String),

    /// Provider answered without any text.
    #[error("Empty response from model")]
    EmptyResponse,

    /// Failed to parse the provider's response envelope.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Only errors that are clearly about the request itself are final; anything
    /// unrecognized is retried.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            LlmError::InvalidRequest(_)
                | LlmError::Auth(_)
                | LlmError::ModelNotFound(_)
                | LlmError::Blocked(_)
        )
    }

    /// Whether this is a rate-limit or quota signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }
}

/// A text-in, text-out model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier used for requests, for logs and diagnostics.
    fn model_name(&self) -> String;

    /// Send one prompt and return the raw reply text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
