//! Whitespace and escape cleanup for extracted text.

/// Remove backslashes and collapse every whitespace run (newlines included) into a
/// single space, trimming both ends.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let without_escapes: String = text.chars().filter(|c| *c != '\\').collect();
    without_escapes
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
