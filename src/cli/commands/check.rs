//! API key and model diagnostics.

use console::style;

use super::helpers::mask_key;
use crate::config::Settings;
use crate::llm::{GeminiClient, LlmError};

/// Validate the configured key by listing the Gemini models it can use.
pub async fn cmd_check() -> anyhow::Result<()> {
    let settings = Settings::from_lookup_unchecked(&|key| std::env::var(key).ok())?;

    println!("\n{}", style("LLM Configuration").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<16} {}", "Endpoint", settings.llm.endpoint);
    println!("  {:<16} {}", "Model", settings.llm.model);
    println!(
        "  {:<16} {}",
        "Fallback",
        settings.llm.effective_fallback().unwrap_or("(none)")
    );

    let key = match settings.llm.require_api_key() {
        Ok(key) => key,
        Err(e) => {
            println!("  {:<16} {}", "API key", style("✗ missing").red());
            return Err(e.into());
        }
    };
    println!("  {:<16} {}", "API key", mask_key(key));

    let client = GeminiClient::new(settings.llm.clone())?;
    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e @ LlmError::Auth(_)) => {
            println!("\n{} API key rejected: {}", style("✗").red(), e);
            return Err(e.into());
        }
        Err(e) => {
            println!("\n{} Could not list models: {}", style("✗").red(), e);
            return Err(e.into());
        }
    };
    println!("\n{} API key is valid", style("✓").green());

    let gemini: Vec<_> = models
        .iter()
        .filter(|m| m.id().contains("gemini"))
        .collect();
    println!("\n{}", style("Available Gemini models:").cyan());
    for model in &gemini {
        let marker = if !model.supports_generate_content() {
            style("○").dim()
        } else if model.id() == settings.llm.model {
            style("●").green()
        } else {
            style("✓").green()
        };
        println!("  {} {:<32} {}", marker, model.id(), style(&model.display_name).dim());
    }

    let configured = gemini.iter().any(|m| m.id() == settings.llm.model);
    if !configured {
        println!(
            "\n{} Configured model {} is not in the list",
            style("!").yellow(),
            settings.llm.model
        );
    }
    Ok(())
}
