//! Prompt construction.
//!
//! The category list and reply shape are what the response parser relies on, so
//! they are fixed for every call.

/// Closed set of labels the model must classify into.
pub const CATEGORIES: &[&str] = &[
    "Contract / Agreement",
    "Memorandum of Understanding",
    "Power of Attorney",
    "Invoice / Receipt",
    "Purchase Order",
    "Financial Report",
    "Official Letter",
    "Court Decision",
    "Regulation / Policy",
    "Meeting Minutes",
    "Certificate / License",
    "Other",
];

/// Reply shape the model is asked to produce.
const REPLY_SHAPE: &str = r#"{
  "document_type": "<one label from the list above>",
  "summary": "<concise summary in plain prose>",
  "key_entities": ["<party, person, organization, amount or date>", "..."],
  "critical_points": ["<obligation, deadline, penalty or other clause that matters>", "..."],
  "risk_analysis": "<legal and financial risks, in plain prose>"
}"#;

/// A prompt ready to send, plus how much document text it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    /// Characters of document text embedded in `text`.
    pub excerpt_chars: usize,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Build the analysis prompt for normalized `text`.
    ///
    /// Only the first `max_chars` characters of `text` are included.
    pub fn build(&self, text: &str, hint: &str) -> Prompt {
        let excerpt = truncate_chars(text, self.max_chars);
        let excerpt_chars = excerpt.chars().count();

        let categories = CATEGORIES
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");

        let text = format!(
            "You are an experienced legal and document analyst. Read the document below \
and produce a structured analysis.\n\n\
The user believes this document is: {hint}\n\
Treat that as a hint only; classify by the content.\n\n\
Choose document_type from exactly one of these categories:\n{categories}\n\n\
Reply with a single JSON object of this shape and nothing else:\n{shape}\n\n\
Rules:\n\
- Do not wrap the JSON in code fences.\n\
- Do not use markdown (no asterisks, headings or bullet markers) inside any string value.\n\
- Use empty strings or empty lists when something does not apply.\n\n\
DOCUMENT:\n{excerpt}",
            hint = hint,
            categories = categories,
            shape = REPLY_SHAPE,
            excerpt = excerpt,
        );

        Prompt {
            text,
            excerpt_chars,
        }
    }
}

/// First `max` characters of `text` (UTF-8 safe).
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_contract() {
        let prompt = PromptBuilder::new(100).build("Perjanjian sewa gedung.", "Contract");

        assert!(prompt.text.contains("legal and document analyst"));
        assert!(prompt.text.contains("The user believes this document is: Contract"));
        for category in CATEGORIES {
            assert!(prompt.text.contains(category));
        }
        for key in [
            "document_type",
            "summary",
            "key_entities",
            "critical_points",
            "risk_analysis",
        ] {
            assert!(prompt.text.contains(key), "missing {}", key);
        }
        assert!(prompt.text.contains("code fences"));
        assert!(prompt.text.ends_with("Perjanjian sewa gedung."));
        assert_eq!(prompt.excerpt_chars, 23);
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let text = "a".repeat(25_000);
        let prompt = PromptBuilder::new(20_000).build(&text, "General");

        assert_eq!(prompt.excerpt_chars, 20_000);
        assert!(prompt.text.ends_with(&"a".repeat(20_000)));
        assert!(!prompt.text.contains(&"a".repeat(20_001)));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
