//! The two model call shapes used by the pipeline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use sourcescout_shared::{Industry, Result, SourceScoutError};

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::prompts;
use crate::score::{Judgment, parse_judgment};

/// A completion backend plus per-call timeout.
#[derive(Clone)]
pub struct LanguageModel {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl LanguageModel {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Summarize page text for an industry. Empty output is a provider error.
    #[instrument(skip(self, text), fields(industry = %industry, url = %url, chars = text.len()))]
    pub async fn summarize(&self, industry: &Industry, url: &str, text: &str) -> Result<String> {
        let prompt = prompts::summarize_prompt(industry, url, text);
        let raw = self.call(CompletionRequest::text(prompt)).await?;
        let summary = raw.trim();
        if summary.is_empty() {
            return Err(SourceScoutError::provider("model returned an empty summary"));
        }
        Ok(summary.to_string())
    }

    /// Judge a summary's relevance. Unparseable output is a parse error.
    #[instrument(skip(self, summary), fields(industry = %industry, url = %url))]
    pub async fn score(&self, industry: &Industry, url: &str, summary: &str) -> Result<Judgment> {
        let prompt = prompts::score_prompt(industry, url, summary);
        let raw = self.call(CompletionRequest::json(prompt)).await?;
        let judgment = parse_judgment(&raw)?;
        debug!(verdict = %judgment.verdict, "scored");
        Ok(judgment)
    }

    async fn call(&self, request: CompletionRequest) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.backend.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(SourceScoutError::provider(format!(
                "model call timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sourcescout_shared::Verdict;

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionBackend for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Stalled;

    #[async_trait]
    impl CompletionBackend for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    fn industry() -> Industry {
        Industry::new("fintech").unwrap()
    }

    #[test]
    fn backend_name_comes_from_backend() {
        let model = LanguageModel::new(Arc::new(Fixed("")), Duration::from_secs(1));
        assert_eq!(model.backend_name(), "fixed");
    }

    #[tokio::test]
    async fn summarize_trims_output() {
        let model = LanguageModel::new(Arc::new(Fixed("  A summary.\n")), Duration::from_secs(1));
        let out = model.summarize(&industry(), "https://a.example", "text").await.unwrap();
        assert_eq!(out, "A summary.");
    }

    #[tokio::test]
    async fn empty_summary_is_error() {
        let model = LanguageModel::new(Arc::new(Fixed("   ")), Duration::from_secs(1));
        assert!(model.summarize(&industry(), "https://a.example", "text").await.is_err());
    }

    #[tokio::test]
    async fn score_parses_judgment() {
        let model = LanguageModel::new(
            Arc::new(Fixed(r#"{"reliable": "No", "reason": "Off topic."}"#)),
            Duration::from_secs(1),
        );
        let j = model.score(&industry(), "https://a.example", "summary").await.unwrap();
        assert_eq!(j.verdict, Verdict::Discarded);
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let model = LanguageModel::new(Arc::new(Stalled), Duration::from_millis(20));
        let err = model.summarize(&industry(), "https://a.example", "text").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
