//! Gemini `generateContent` client.
//!
//! Requests use the API key header rather than a query parameter so the key never
//! shows up in URLs or error messages.

mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use config::LlmConfig;

use super::{LanguageModel, LlmError};
use crate::config::ConfigError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Harm categories the safety threshold is applied to.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini API request format.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings", skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting<'a> {
    category: &'static str,
    threshold: &'a str,
}

/// Gemini API response format.
#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// A model advertised by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-1.5-flash`.
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "supportedGenerationMethods", default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Model id without the `models/` prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Map a non-success HTTP response to an error.
fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> LlmError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.chars().take(500).collect(), String::new()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return LlmError::RateLimited {
            message,
            retry_after,
        };
    }

    match status {
        StatusCode::BAD_REQUEST => {
            // Gemini reports a bad key as 400 INVALID_ARGUMENT.
            if message.to_lowercase().contains("api key") {
                LlmError::Auth(message)
            } else {
                LlmError::InvalidRequest(message)
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(message),
        StatusCode::NOT_FOUND => LlmError::ModelNotFound(message),
        _ => LlmError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull the reply text out of a successful response body.
fn extract_text(body: &str) -> Result<String, LlmError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(LlmError::Blocked(reason));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LlmError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(LlmError::Blocked(reason.to_string()))
            }
            _ => Err(LlmError::EmptyResponse),
        };
    }
    Ok(text)
}

/// Gemini client implementing [`LanguageModel`].
pub struct GeminiClient {
    config: LlmConfig,
    api_key: String,
    client: Client,
    /// Set once the primary model has been rejected as unknown.
    using_fallback: AtomicBool,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.active_model())
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client. Fails without an API key.
    pub fn new(config: LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
            using_fallback: AtomicBool::new(false),
        })
    }

    /// Model currently used for requests.
    pub fn active_model(&self) -> &str {
        match self.config.effective_fallback() {
            Some(fallback) if self.using_fallback.load(Ordering::Relaxed) => fallback,
            _ => &self.config.model,
        }
    }

    /// List models available to the configured key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/v1beta/models?pageSize=1000", self.config.endpoint);
        let resp = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.without_url().to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &headers, &body));
        }

        let list: ModelList =
            serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(list.models)
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        let safety_settings = match self.config.safety_threshold.as_deref() {
            Some(threshold) => HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold,
                })
                .collect(),
            None => Vec::new(),
        };

        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
            safety_settings,
        }
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint, model
        );
        let request = self.build_request(prompt);

        debug!("Calling {} with {} prompt chars", model, prompt.len());
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.without_url().to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &headers, &body));
        }
        extract_text(&body)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> String {
        self.active_model().to_string()
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let model = self.active_model().to_string();
        match self.call_model(&model, prompt).await {
            Err(LlmError::ModelNotFound(message)) => {
                let Some(fallback) = self.config.effective_fallback() else {
                    return Err(LlmError::ModelNotFound(message));
                };
                if model == fallback {
                    return Err(LlmError::ModelNotFound(message));
                }
                // Concurrent requests can all miss the primary; only the first one logs.
                if !self.using_fallback.swap(true, Ordering::Relaxed) {
                    warn!(
                        "Model {} unavailable ({}), switching to fallback {}",
                        model, message, fallback
                    );
                }
                self.call_model(fallback, prompt).await
            }
            other => other,
        }
    }
}
