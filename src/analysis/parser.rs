//! Recovering a structured result from free-form model text.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use super::types::AnalysisResult;

/// Why a reply could not be read as a JSON object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseParseError {
    #[error("no JSON object found in model reply")]
    NoObject,

    #[error("invalid JSON in model reply: {0}")]
    Json(String),
}

/// Pull the JSON object out of `text`.
///
/// Markdown fences are dropped, then everything from the first `{` to the last `}`
/// is parsed. Commentary before or after the object is ignored.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ResponseParseError> {
    let cleaned = text.replace("```json", "").replace("```", "");

    let start = cleaned.find('{').ok_or(ResponseParseError::NoObject)?;
    let end = cleaned.rfind('}').ok_or(ResponseParseError::NoObject)?;
    if end < start {
        return Err(ResponseParseError::NoObject);
    }

    serde_json::from_str::<Map<String, Value>>(&cleaned[start..=end])
        .map_err(|e| ResponseParseError::Json(e.to_string()))
}

/// Turn a model reply into an [`AnalysisResult`]. Never fails.
///
/// Unreadable replies produce a degraded result classified as `hint` whose summary
/// says the reply could not be parsed.
pub fn parse_response(text: &str, hint: &str) -> AnalysisResult {
    match extract_json_object(text) {
        Ok(map) => from_object(&map, hint),
        Err(e) => {
            warn!("Falling back to degraded result: {}", e);
            AnalysisResult {
                document_type: hint.to_string(),
                summary: format!("The AI response could not be parsed ({}).", e),
                key_entities: Vec::new(),
                critical_points: Vec::new(),
                risk_analysis: String::new(),
            }
        }
    }
}

fn from_object(map: &Map<String, Value>, hint: &str) -> AnalysisResult {
    let document_type = map
        .get("document_type")
        .map(as_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| hint.to_string());

    AnalysisResult {
        document_type,
        summary: map.get("summary").map(as_text).unwrap_or_default(),
        key_entities: map.get("key_entities").map(as_list).unwrap_or_default(),
        critical_points: map.get("critical_points").map(as_list).unwrap_or_default(),
        risk_analysis: map.get("risk_analysis").map(as_text).unwrap_or_default(),
    }
}

/// Strings as-is, null as empty, anything else as compact JSON.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(as_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"{"document_type":"Invoice / Receipt","summary":"Tagihan jasa konsultasi.","key_entities":["PT Sinar","Rp 15.000.000"],"critical_points":["Jatuh tempo 30 hari"],"risk_analysis":"Denda keterlambatan 2%."}"#;

    #[test]
    fn test_fenced_reply_matches_bare_json() {
        let fenced = format!(
            "Sure! Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.",
            BARE
        );
        assert_eq!(
            parse_response(&fenced, "General"),
            parse_response(BARE, "General")
        );

        let result = parse_response(BARE, "General");
        assert_eq!(result.document_type, "Invoice / Receipt");
        assert_eq!(result.key_entities, vec!["PT Sinar", "Rp 15.000.000"]);
    }

    #[test]
    fn test_missing_document_type_is_backfilled() {
        let result = parse_response(r#"{"summary":"x","key_entities":[]}"#, "Invoice");
        assert_eq!(result.document_type, "Invoice");

        let result = parse_response(r#"{"document_type":"  ","summary":"x"}"#, "Invoice");
        assert_eq!(result.document_type, "Invoice");
    }

    #[test]
    fn test_garbage_gives_degraded_result() {
        let result = parse_response("I cannot help with that.", "Contract");
        assert_eq!(result.document_type, "Contract");
        assert!(result.summary.contains("could not be parsed"));
        assert!(result.key_entities.is_empty());
        assert!(result.critical_points.is_empty());
        assert!(result.risk_analysis.is_empty());
    }

    #[test]
    fn test_extract_errors() {
        assert_eq!(extract_json_object("no braces"), Err(ResponseParseError::NoObject));
        assert_eq!(extract_json_object("} backwards {"), Err(ResponseParseError::NoObject));
        assert!(matches!(
            extract_json_object("{not: json}"),
            Err(ResponseParseError::Json(_))
        ));
        let map = extract_json_object("[{\"a\": 1}]").unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_tolerant_field_mapping() {
        let reply = r#"{
            "document_type": "Contract / Agreement",
            "summary": null,
            "key_entities": "PT Maju Jaya",
            "critical_points": ["Termination clause", 42, {"clause": "7.2"}, ""],
            "risk_analysis": {"level": "high", "notes": ["penalty"]}
        }"#;
        let result = parse_response(reply, "General");

        assert_eq!(result.summary, "");
        assert_eq!(result.key_entities, vec!["PT Maju Jaya"]);
        assert_eq!(
            result.critical_points,
            vec!["Termination clause", "42", r#"{"clause":"7.2"}"#]
        );
        assert_eq!(result.risk_analysis, r#"{"level":"high","notes":["penalty"]}"#);
    }
}
