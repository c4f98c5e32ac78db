//! pdfsage - AI-assisted PDF document analysis.
//!
//! Reads the text of a PDF, asks a Gemini model to classify and summarize it,
//! and recovers a structured result from the reply. Also proposes signature
//! boxes next to sign-off keywords.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod llm;
pub mod pdf;
pub mod server;
pub mod signature;
pub mod source;
pub mod text;

pub use analysis::{AnalysisOutcome, AnalysisRequest, AnalysisResult, DocumentAnalyzer, ErrorResult};
pub use config::{ConfigError, Settings};
pub use signature::{SignatureLocator, SignatureMatch};
