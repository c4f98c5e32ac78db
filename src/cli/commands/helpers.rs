//! Shared helper functions for CLI commands.

use std::sync::Arc;

use crate::analysis::DocumentAnalyzer;
use crate::config::Settings;
use crate::llm::GeminiClient;

/// Build the analysis pipeline backed by Gemini.
pub fn build_analyzer(settings: &Settings) -> anyhow::Result<DocumentAnalyzer> {
    let client = GeminiClient::new(settings.llm.clone())?;
    Ok(DocumentAnalyzer::new(
        Arc::new(client),
        settings.analyzer,
        settings.retry,
    ))
}

/// Show only the first and last few characters of a secret.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
