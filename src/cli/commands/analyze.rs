//! Document analysis command.

use std::path::Path;

use console::style;

use super::helpers::build_analyzer;
use crate::analysis::AnalysisOutcome;
use crate::config::Settings;
use crate::source::PathSource;

/// Analyze a local PDF and print the result as JSON.
pub async fn cmd_analyze(
    settings: &Settings,
    file: &Path,
    document_type: Option<&str>,
) -> anyhow::Result<()> {
    let analyzer = build_analyzer(settings)?;

    eprintln!(
        "{} Analyzing {} with {}",
        style("→").cyan(),
        file.display(),
        analyzer.model_name()
    );

    let outcome = analyzer
        .analyze_source(PathSource::new(file), document_type)
        .await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome {
        AnalysisOutcome::Success(result) => {
            eprintln!(
                "{} Classified as {}",
                style("✓").green(),
                style(&result.document_type).bold()
            );
            Ok(())
        }
        AnalysisOutcome::Failure(error) => {
            eprintln!("{} {}", style("✗").red(), error.error);
            Err(anyhow::anyhow!("analysis failed: {}", error.error))
        }
    }
}
