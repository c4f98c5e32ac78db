use thiserror::Error;

use crate::llm::{InvokeError, LlmError};
use crate::pdf::PdfError;

/// Message reported for documents without enough readable text.
pub const EMPTY_DOCUMENT_MESSAGE: &str = "document too short or unreadable";

/// Ways a document analysis can fail.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("not a readable PDF: {0}")]
    DocumentFormat(#[from] PdfError),

    #[error("{}", EMPTY_DOCUMENT_MESSAGE)]
    EmptyDocument,

    #[error("failed to reach AI after {attempts} attempts: {last}")]
    LlmUnavailable { attempts: u32, last: LlmError },

    #[error("AI request rejected: {0}")]
    LlmRejected(LlmError),

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InvokeError> for AnalyzeError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Exhausted { attempts, last } => {
                AnalyzeError::LlmUnavailable { attempts, last }
            }
            InvokeError::Rejected(e) => AnalyzeError::LlmRejected(e),
        }
    }
}
