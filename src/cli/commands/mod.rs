//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod analyze;
mod check;
mod helpers;
mod serve;
mod signatures;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "pdfsage")]
#[command(about = "AI-assisted PDF document analysis and signature placement")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and summarize a PDF document
    Analyze {
        /// PDF file to analyze
        file: PathBuf,
        /// What the document is believed to be (e.g. "Invoice")
        #[arg(short = 't', long = "type")]
        document_type: Option<String>,
    },

    /// Propose signature boxes next to sign-off keywords
    Signatures {
        /// PDF file to search
        file: PathBuf,
        /// Keyword to look for (repeatable; defaults to common sign-off phrases)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },

    /// Start the HTTP service
    Serve {
        /// Address to bind: "PORT", "HOST" or "HOST:PORT" (defaults to HOST/PORT env)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Validate the API key and list available Gemini models
    Check,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            file,
            document_type,
        } => {
            let settings = Settings::from_env()?;
            analyze::cmd_analyze(&settings, &file, document_type.as_deref()).await
        }
        Commands::Signatures { file, keywords } => {
            signatures::cmd_signatures(&file, keywords).await
        }
        Commands::Serve { bind } => {
            let settings = Settings::from_env()?;
            serve::cmd_serve(&settings, bind.as_deref()).await
        }
        Commands::Check => check::cmd_check().await,
    }
}
