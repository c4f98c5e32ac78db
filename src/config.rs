//! Runtime settings, read from the environment.
//!
//! Every knob has a default; only the LLM API key is mandatory. A `.env` file is
//! loaded by the binary before anything here runs.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::llm::{LlmConfig, RetryPolicy};
use crate::text::DEFAULT_PAGE_LIMIT;

/// Configuration problems detected at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("LLM API key missing: set GEMINI_API_KEY or GOOGLE_API_KEY")]
    MissingApiKey,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Looks up a single variable by name.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Parse variable `key` if it is set and non-blank.
pub fn parse_var<T: FromStr>(lookup: EnvLookup<'_>, key: &str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Limits applied to each analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalyzerConfig {
    /// Pages read from the start of each document
    pub page_limit: usize,
    /// Characters of document text sent to the model
    pub max_prompt_chars: usize,
    /// Documents with less normalized text than this are rejected
    pub min_text_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            max_prompt_chars: 20_000,
            min_text_chars: 50,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_overrides(mut self, lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        if let Some(n) = parse_var(lookup, "ANALYZER_PAGE_LIMIT")? {
            self.page_limit = n;
        }
        if let Some(n) = parse_var(lookup, "ANALYZER_MAX_PROMPT_CHARS")? {
            self.max_prompt_chars = n;
        }
        if let Some(n) = parse_var(lookup, "ANALYZER_MIN_TEXT_CHARS")? {
            self.min_text_chars = n;
        }
        Ok(self)
    }
}

/// Where the HTTP service listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn with_overrides(mut self, lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = parse_var(lookup, "PORT")? {
            self.port = port;
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything the service needs to run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmConfig,
    pub analyzer: AnalyzerConfig,
    pub retry: RetryPolicy,
    pub server: ServerConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, failing when no API key is configured.
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let settings = Self::from_lookup_unchecked(lookup)?;
        settings.llm.require_api_key()?;
        Ok(settings)
    }

    /// Like [`Settings::from_lookup`] but tolerates a missing API key.
    pub fn from_lookup_unchecked(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::default().with_overrides(lookup)?,
            analyzer: AnalyzerConfig::default().with_overrides(lookup)?,
            retry: RetryPolicy::default().with_overrides(lookup)?,
            server: ServerConfig::default().with_overrides(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_in<'a>(
        vars: &'a HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let vars = HashMap::new();
        let err = Settings::from_lookup(&lookup_in(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_defaults_with_key() {
        let vars = HashMap::from([("GEMINI_API_KEY", "k")]);
        let settings = Settings::from_lookup(&lookup_in(&vars)).unwrap();

        assert_eq!(settings.analyzer, AnalyzerConfig::default());
        assert_eq!(settings.analyzer.page_limit, 20);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.delay, Duration::from_secs(2));
        assert_eq!(settings.server.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            ("GOOGLE_API_KEY", "k"),
            ("ANALYZER_PAGE_LIMIT", "5"),
            ("ANALYZER_MAX_PROMPT_CHARS", "1000"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("LLM_RATE_LIMIT_DELAY_MS", "10"),
        ]);
        let settings = Settings::from_lookup(&lookup_in(&vars)).unwrap();

        assert_eq!(settings.analyzer.page_limit, 5);
        assert_eq!(settings.analyzer.max_prompt_chars, 1000);
        assert_eq!(settings.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(settings.retry.rate_limit_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let vars = HashMap::from([("GEMINI_API_KEY", "k"), ("PORT", "http")]);
        let err = Settings::from_lookup(&lookup_in(&vars)).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for PORT: \"http\"");
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let vars = HashMap::from([("ANALYZER_MIN_TEXT_CHARS", "  ")]);
        let settings = Settings::from_lookup_unchecked(&lookup_in(&vars)).unwrap();
        assert_eq!(settings.analyzer.min_text_chars, 50);
    }
}
