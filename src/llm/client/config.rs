//! LLM client configuration.

use serde::{Deserialize, Serialize};

use crate::config::{parse_var, ConfigError, EnvLookup};

/// Configuration for the Gemini client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API endpoint (scheme and host, no path)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key; required before any request is made
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model used for analysis
    #[serde(default = "default_model")]
    pub model: String,
    /// Model switched to when the primary one is rejected as unknown
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Block threshold applied to every harm category (e.g. "BLOCK_NONE");
    /// provider defaults apply when unset
    #[serde(default)]
    pub safety_threshold: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_fallback_model() -> Option<String> {
    Some("gemini-1.5-flash".to_string())
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            fallback_model: default_fallback_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            safety_threshold: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Apply environment overrides.
    ///
    /// Supported vars:
    /// - `GEMINI_API_KEY` / `GOOGLE_API_KEY`: API key (first one set wins)
    /// - `LLM_ENDPOINT`: API endpoint
    /// - `LLM_MODEL`: Model name
    /// - `LLM_FALLBACK_MODEL`: Fallback model name (empty disables the fallback)
    /// - `LLM_MAX_TOKENS`: Maximum tokens in response
    /// - `LLM_TEMPERATURE`: Generation temperature (0.0-2.0)
    /// - `LLM_SAFETY_THRESHOLD`: Harm block threshold
    /// - `LLM_TIMEOUT_SECS`: Request timeout
    pub fn with_overrides(mut self, lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("GOOGLE_API_KEY"))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if key.is_some() {
            self.api_key = key;
        }

        if let Some(endpoint) = lookup("LLM_ENDPOINT") {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(fallback) = lookup("LLM_FALLBACK_MODEL") {
            let fallback = fallback.trim();
            self.fallback_model = (!fallback.is_empty()).then(|| fallback.to_string());
        }
        if let Some(n) = parse_var(lookup, "LLM_MAX_TOKENS")? {
            self.max_tokens = n;
        }
        if let Some(t) = parse_var::<f32>(lookup, "LLM_TEMPERATURE")? {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidValue {
                    key: "LLM_TEMPERATURE".to_string(),
                    value: t.to_string(),
                });
            }
            self.temperature = t;
        }
        if let Some(threshold) = lookup("LLM_SAFETY_THRESHOLD").filter(|s| !s.trim().is_empty()) {
            self.safety_threshold = Some(threshold.trim().to_uppercase());
        }
        if let Some(secs) = parse_var(lookup, "LLM_TIMEOUT_SECS")? {
            self.timeout_secs = secs;
        }
        Ok(self)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// The API key, or the error reported when it is missing.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    /// Fallback model, if configured and distinct from the primary.
    pub fn effective_fallback(&self) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .filter(|fallback| *fallback != self.model)
    }
}
