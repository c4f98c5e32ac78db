//! Request and result records for document analysis.

use serde::{Deserialize, Serialize};

/// Hint used when the caller does not say what kind of document it is.
pub const DEFAULT_HINT: &str = "General";

/// A document plus the caller's guess at its type.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document: Vec<u8>,
    pub document_type_hint: String,
}

impl AnalysisRequest {
    /// Build a request; a missing or blank hint becomes [`DEFAULT_HINT`].
    pub fn new(document: Vec<u8>, hint: Option<&str>) -> Self {
        Self {
            document,
            document_type_hint: normalize_hint(hint),
        }
    }
}

/// Trimmed hint, or [`DEFAULT_HINT`] when there is nothing left.
pub fn normalize_hint(hint: Option<&str>) -> String {
    hint.map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HINT)
        .to_string()
}

/// Structured analysis of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Always populated; falls back to the caller's hint.
    pub document_type: String,
    pub summary: String,
    pub key_entities: Vec<String>,
    pub critical_points: Vec<String>,
    pub risk_analysis: String,
}

/// Returned in place of an [`AnalysisResult`] when analysis cannot finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
    pub document_type: String,
}

/// Either a finished analysis or the reason there isn't one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Success(AnalysisResult),
    Failure(ErrorResult),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }

    pub fn document_type(&self) -> &str {
        match self {
            AnalysisOutcome::Success(result) => &result.document_type,
            AnalysisOutcome::Failure(error) => &error.document_type,
        }
    }
}
