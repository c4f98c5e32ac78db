//! The document analysis pipeline.
//!
//! Extract the first pages of text, normalize it, build a prompt, ask the model and
//! parse whatever comes back. The PDF work is synchronous ([`DocumentAnalyzer::prepare`])
//! and the model call is async ([`DocumentAnalyzer::complete`]) so callers can run
//! the first half on a blocking thread.

mod error;
mod parser;
mod prompt;
mod types;

use std::sync::Arc;

use tracing::{debug, info};

pub use error::{AnalyzeError, EMPTY_DOCUMENT_MESSAGE};
pub use parser::{extract_json_object, parse_response, ResponseParseError};
pub use prompt::{Prompt, PromptBuilder, CATEGORIES};
pub use types::{
    normalize_hint, AnalysisOutcome, AnalysisRequest, AnalysisResult, ErrorResult, DEFAULT_HINT,
};

use crate::config::AnalyzerConfig;
use crate::llm::{LanguageModel, LlmInvoker, RetryPolicy};
use crate::source::ByteSource;
use crate::text::{normalize, TextExtractor};

/// Runs the full analysis pipeline against one model.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    extractor: TextExtractor,
    prompts: PromptBuilder,
    invoker: LlmInvoker,
    min_text_chars: usize,
}

impl DocumentAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>, config: AnalyzerConfig, retry: RetryPolicy) -> Self {
        Self {
            extractor: TextExtractor::new(config.page_limit),
            prompts: PromptBuilder::new(config.max_prompt_chars),
            invoker: LlmInvoker::new(model, retry),
            min_text_chars: config.min_text_chars,
        }
    }

    pub fn model_name(&self) -> String {
        self.invoker.model_name()
    }

    /// Read `bytes` and build the prompt for them.
    ///
    /// Fails when the bytes are not a PDF or carry too little text to analyze.
    pub fn prepare(&self, bytes: &[u8], hint: &str) -> Result<Prompt, AnalyzeError> {
        let extracted = self.extractor.extract(bytes)?;
        let text = normalize(&extracted.concatenated());
        let chars = text.chars().count();

        info!(
            "Read {} of {} pages, {} chars of text",
            extracted.pages.len(),
            extracted.total_pages,
            chars
        );
        if chars < self.min_text_chars {
            return Err(AnalyzeError::EmptyDocument);
        }

        let prompt = self.prompts.build(&text, hint);
        debug!(
            "Prompt is {} chars ({} from the document)",
            prompt.text.chars().count(),
            prompt.excerpt_chars
        );
        Ok(prompt)
    }

    /// Send a prepared prompt and parse the reply.
    pub async fn complete(&self, prompt: &Prompt, hint: &str) -> Result<AnalysisResult, AnalyzeError> {
        let reply = self.invoker.invoke(&prompt.text).await?;
        debug!("Model replied with {} chars", reply.chars().count());
        Ok(parse_response(&reply, hint))
    }

    /// Analyze `bytes`, reporting failures as errors.
    pub async fn try_analyze(&self, bytes: &[u8], hint: &str) -> Result<AnalysisResult, AnalyzeError> {
        let prompt = self.prepare(bytes, hint)?;
        self.complete(&prompt, hint).await
    }

    /// Analyze a request. Failures become an [`ErrorResult`] carrying the hint.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let hint = request.document_type_hint;
        let result = self.try_analyze(&request.document, &hint).await;
        fold(result, hint)
    }

    /// Read a document from `source` and analyze it.
    pub async fn analyze_source<S: ByteSource>(&self, source: S, hint: Option<&str>) -> AnalysisOutcome {
        let hint = normalize_hint(hint);
        match source.read_all() {
            Ok(bytes) => self.analyze(AnalysisRequest::new(bytes, Some(hint.as_str()))).await,
            Err(e) => fold(Err(AnalyzeError::Io(e)), hint),
        }
    }
}

/// Fold a pipeline result into the outcome returned to callers.
pub fn fold(result: Result<AnalysisResult, AnalyzeError>, hint: String) -> AnalysisOutcome {
    match result {
        Ok(result) => AnalysisOutcome::Success(result),
        Err(e) => {
            info!("Analysis failed: {}", e);
            AnalysisOutcome::Failure(ErrorResult {
                error: e.to_string(),
                document_type: hint,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::LlmError;
    use crate::pdf::testing::{build_pdf, item};
    use crate::source::PathSource;

    const REPLY: &str = r#"{"document_type":"Contract / Agreement","summary":"Lease of office space.","key_entities":["PT Maju Jaya"],"critical_points":["Two year term"],"risk_analysis":"Low."}"#;

    fn lease_pdf() -> Vec<u8> {
        build_pdf(&[vec![
            item(72, 700, "PERJANJIAN SEWA MENYEWA GEDUNG KANTOR"),
            item(72, 680, "Antara PT Maju Jaya dan PT Sinar Abadi untuk jangka waktu dua tahun."),
        ]])
    }

    fn analyzer(model: Arc<ScriptedModel>) -> DocumentAnalyzer {
        DocumentAnalyzer::new(model, AnalyzerConfig::default(), RetryPolicy::immediate(3))
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let outcome = analyzer(model.clone())
            .analyze(AnalysisRequest::new(lease_pdf(), Some("Contract")))
            .await;

        match outcome {
            AnalysisOutcome::Success(result) => {
                assert_eq!(result.document_type, "Contract / Agreement");
                assert_eq!(result.key_entities, vec!["PT Maju Jaya"]);
            }
            other => panic!("expected success, got {:?}", other),
        }
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("PT Sinar Abadi"));
        assert!(prompts[0].contains("The user believes this document is: Contract"));
    }

    #[tokio::test]
    async fn test_blank_document_never_calls_model() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let outcome = analyzer(model.clone())
            .analyze(AnalysisRequest::new(build_pdf(&[vec![]]), Some("Invoice")))
            .await;

        assert_eq!(
            outcome,
            AnalysisOutcome::Failure(ErrorResult {
                error: EMPTY_DOCUMENT_MESSAGE.to_string(),
                document_type: "Invoice".to_string(),
            })
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_short_text_is_rejected() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let pdf = build_pdf(&[vec![item(72, 700, "Too short.")]]);
        let err = analyzer(model.clone())
            .try_analyze(&pdf, "General")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzeError::EmptyDocument));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_is_format_error() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let outcome = analyzer(model.clone())
            .analyze(AnalysisRequest::new(b"hello".to_vec(), None))
            .await;

        match outcome {
            AnalysisOutcome::Failure(error) => {
                assert!(error.error.starts_with("not a readable PDF"));
                assert_eq!(error.document_type, "General");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_type_backfilled_from_hint() {
        let model = Arc::new(ScriptedModel::replying(r#"{"summary":"Tagihan."}"#));
        let result = analyzer(model)
            .try_analyze(&lease_pdf(), "Invoice")
            .await
            .unwrap();
        assert_eq!(result.document_type, "Invoice");
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let flaky = || Err(LlmError::Connection("reset".to_string()));

        let model = Arc::new(ScriptedModel::new(vec![flaky(), Ok(REPLY.to_string())]));
        let outcome = analyzer(model.clone())
            .analyze(AnalysisRequest::new(lease_pdf(), None))
            .await;
        assert!(outcome.is_success());
        assert_eq!(model.calls(), 2);

        let model = Arc::new(ScriptedModel::new(vec![flaky()]));
        let outcome = analyzer(model.clone())
            .analyze(AnalysisRequest::new(lease_pdf(), None))
            .await;
        match outcome {
            AnalysisOutcome::Failure(error) => assert!(error.error.starts_with("failed to reach AI")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_analyze_from_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), lease_pdf()).unwrap();

        let model = Arc::new(ScriptedModel::replying(REPLY));
        let outcome = analyzer(model)
            .analyze_source(PathSource::new(tmp.path()), Some(""))
            .await;
        assert!(outcome.is_success());

        let model = Arc::new(ScriptedModel::replying(REPLY));
        let outcome = analyzer(model)
            .analyze_source(PathSource::new("/nonexistent/file.pdf"), Some("Invoice"))
            .await;
        assert_eq!(outcome.document_type(), "Invoice");
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_prompt_excerpt_bounded() {
        let long = "Pasal tentang kewajiban para pihak. ".repeat(40);
        let pdf = build_pdf(&[vec![item(20, 700, &long)]]);
        let config = AnalyzerConfig {
            max_prompt_chars: 100,
            ..AnalyzerConfig::default()
        };
        let analyzer = DocumentAnalyzer::new(
            Arc::new(ScriptedModel::replying(REPLY)),
            config,
            RetryPolicy::default(),
        );
        let prompt = analyzer.prepare(&pdf, "General").unwrap();
        assert_eq!(prompt.excerpt_chars, 100);
    }
}
