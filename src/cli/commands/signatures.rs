//! Signature placement command.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::signature::SignatureLocator;
use crate::source::{ByteSource, PathSource};

/// Locate signature boxes in a local PDF and print them as JSON.
pub async fn cmd_signatures(file: &Path, keywords: Vec<String>) -> anyhow::Result<()> {
    let bytes = PathSource::new(file)
        .read_all()
        .with_context(|| format!("failed to read {}", file.display()))?;

    let locator = SignatureLocator::new(keywords);
    let matches = tokio::task::spawn_blocking(move || locator.locate_bytes(&bytes)).await??;

    println!("{}", serde_json::to_string_pretty(&matches)?);

    if matches.is_empty() {
        eprintln!("{} No signature keywords found", style("!").yellow());
    } else {
        eprintln!(
            "{} {} signature location(s) found",
            style("✓").green(),
            matches.len()
        );
    }
    Ok(())
}
