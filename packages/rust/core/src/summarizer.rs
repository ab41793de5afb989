//! Page summarization stage.
//!
//! The summarizer is the only writer of the summary store. Each summary is
//! persisted as soon as its model call returns, so an interrupted run keeps
//! everything completed so far.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use sourcescout_llm::LanguageModel;
use sourcescout_llm::prompts::{truncate_chars, truncate_content};
use sourcescout_shared::{Industry, LlmConfig, PageContent, Result, Summary};
use sourcescout_storage::Storage;

use crate::pipeline::ProgressReporter;

/// Counters for one summarize pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummarizeStats {
    pub candidates: usize,
    pub summarized: usize,
    pub skipped_failed_fetch: usize,
    pub skipped_short: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Why a page produced no summary without calling the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FailedFetch,
    TooShort,
    AlreadySummarized,
}

pub struct Summarizer {
    model: LanguageModel,
    config: LlmConfig,
}

impl Summarizer {
    pub fn new(model: LanguageModel, config: LlmConfig) -> Self {
        Self { model, config }
    }

    /// Decide whether a page is summarized at all.
    pub fn skip_reason(&self, page: &PageContent, existing: &HashSet<String>) -> Option<SkipReason> {
        if existing.contains(&page.url) {
            return Some(SkipReason::AlreadySummarized);
        }
        match page.text() {
            None => Some(SkipReason::FailedFetch),
            Some(text) if text.chars().count() < self.config.min_content_chars => {
                Some(SkipReason::TooShort)
            }
            Some(_) => None,
        }
    }

    /// Summarize and persist every eligible page.
    ///
    /// Model failures are logged per URL and never abort the pass.
    #[instrument(skip_all, fields(industry = %industry, pages = pages.len()))]
    pub async fn summarize_all(
        &self,
        industry: &Industry,
        pages: &[PageContent],
        storage: &Storage,
        progress: &dyn ProgressReporter,
    ) -> Result<SummarizeStats> {
        let existing = storage.summarized_urls(industry).await?;
        let mut stats = SummarizeStats {
            candidates: pages.len(),
            ..Default::default()
        };

        let mut eligible = Vec::new();
        for page in pages {
            match self.skip_reason(page, &existing) {
                Some(SkipReason::AlreadySummarized) => stats.skipped_existing += 1,
                Some(SkipReason::FailedFetch) => stats.skipped_failed_fetch += 1,
                Some(SkipReason::TooShort) => {
                    debug!(url = %page.url, "page text too short, skipping");
                    stats.skipped_short += 1;
                }
                None => eligible.push(page),
            }
        }

        info!(
            eligible = eligible.len(),
            concurrency = self.config.summarize_concurrency,
            "summarizing pages"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.summarize_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_urls = HashMap::with_capacity(eligible.len());

        for page in &eligible {
            let model = self.model.clone();
            let sem = Arc::clone(&semaphore);
            let industry = industry.clone();
            let seq = page.seq;
            let url = page.url.clone();
            let input = truncate_content(page.text().unwrap_or_default(), self.config.max_input_chars);

            let handle = tasks.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let result = model.summarize(&industry, &url, &input).await;
                (seq, url, result)
            });
            task_urls.insert(handle.id(), page.url.clone());
        }

        let total = eligible.len();
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            done += 1;
            let (seq, url, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let url = task_urls.get(&e.id()).map_or("unknown", String::as_str);
                    warn!(url = %url, error = %e, "summarize task failed");
                    progress.item("summarize", url, done, total);
                    stats.failed += 1;
                    continue;
                }
            };
            progress.item("summarize", &url, done, total);

            match result {
                Ok(text) => {
                    let summary = Summary {
                        seq,
                        url: url.clone(),
                        summary_text: truncate_chars(&text, self.config.max_summary_chars)
                            .trim_end()
                            .to_string(),
                        industry: industry.clone(),
                        created_at: Utc::now(),
                    };
                    if storage.insert_summary(&summary).await? {
                        stats.summarized += 1;
                    } else {
                        stats.skipped_existing += 1;
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "summarization failed, skipping");
                    stats.failed += 1;
                }
            }
        }

        info!(
            summarized = stats.summarized,
            failed = stats.failed,
            skipped = stats.skipped_existing + stats.skipped_failed_fetch + stats.skipped_short,
            "summarize complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::testing::{ScriptedBackend, industry, storage};
    use sourcescout_shared::PageBody;
    use std::time::Duration;

    fn config(min: usize, max_summary: usize) -> LlmConfig {
        let mut cfg = LlmConfig::from(&sourcescout_shared::AppConfig::default());
        cfg.min_content_chars = min;
        cfg.max_summary_chars = max_summary;
        cfg.summarize_concurrency = 2;
        cfg
    }

    fn page(seq: u64, url: &str, body: PageBody) -> PageContent {
        PageContent {
            seq,
            url: url.into(),
            body,
        }
    }

    fn summarizer(backend: ScriptedBackend, cfg: LlmConfig) -> Summarizer {
        Summarizer::new(LanguageModel::new(Arc::new(backend), Duration::from_secs(2)), cfg)
    }

    #[tokio::test]
    async fn skips_failed_short_and_existing_pages() {
        let storage = storage().await;
        let ind = industry();
        storage
            .insert_summary(&Summary {
                seq: 4,
                url: "https://done.example/".into(),
                summary_text: "old".into(),
                industry: ind.clone(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let pages = vec![
            page(1, "https://ok.example/", PageBody::Text("long enough page text".into())),
            page(2, "https://fail.example/", PageBody::Failed("HTTP 500".into())),
            page(3, "https://short.example/", PageBody::Text("tiny".into())),
            page(4, "https://done.example/", PageBody::Text("long enough page text".into())),
        ];

        let backend = ScriptedBackend::new().summary_for("ok.example", "Fresh summary.");
        let calls = backend.calls();
        let s = summarizer(backend, config(10, 2000));
        let stats = s.summarize_all(&ind, &pages, &storage, &SilentProgress).await.unwrap();

        assert_eq!(stats.summarized, 1);
        assert_eq!(stats.skipped_failed_fetch, 1);
        assert_eq!(stats.skipped_short, 1);
        assert_eq!(stats.skipped_existing, 1);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let stored = storage.list_summaries(&ind).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].url, "https://ok.example/");
        assert_eq!(stored[0].summary_text, "Fresh summary.");
        assert_eq!(stored[1].summary_text, "old");
    }

    #[tokio::test]
    async fn model_failure_skips_only_that_url() {
        let storage = storage().await;
        let ind = industry();
        let pages = vec![
            page(1, "https://broken.example/", PageBody::Text("x".repeat(50))),
            page(2, "https://fine.example/", PageBody::Text("y".repeat(50))),
        ];

        let backend = ScriptedBackend::new()
            .failure_for("broken.example")
            .summary_for("fine.example", "Works.");
        let stats = summarizer(backend, config(10, 2000))
            .summarize_all(&ind, &pages, &storage, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.summarized, 1);
        let stored = storage.list_summaries(&ind).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].seq, 2);
    }

    #[tokio::test]
    async fn crashed_task_skips_only_that_url() {
        let storage = storage().await;
        let ind = industry();
        let pages = vec![
            page(1, "https://crash.example/", PageBody::Text("x".repeat(50))),
            page(2, "https://fine.example/", PageBody::Text("y".repeat(50))),
        ];

        let backend = ScriptedBackend::new()
            .panic_for("crash.example")
            .summary_for("fine.example", "Works.");
        let stats = summarizer(backend, config(10, 2000))
            .summarize_all(&ind, &pages, &storage, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.summarized, 1);
        let stored = storage.list_summaries(&ind).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, "https://fine.example/");
    }

    #[tokio::test]
    async fn summaries_are_capped() {
        let storage = storage().await;
        let ind = industry();
        let pages = vec![page(1, "https://a.example/", PageBody::Text("z".repeat(50)))];

        let backend = ScriptedBackend::new().summary_for("a.example", "abcdefghijklmnop");
        summarizer(backend, config(10, 5))
            .summarize_all(&ind, &pages, &storage, &SilentProgress)
            .await
            .unwrap();

        let stored = storage.list_summaries(&ind).await.unwrap();
        assert_eq!(stored[0].summary_text, "abcde");
    }

    #[tokio::test]
    async fn rerun_does_not_redo_work() {
        let storage = storage().await;
        let ind = industry();
        let pages = vec![page(1, "https://a.example/", PageBody::Text("z".repeat(50)))];

        let backend = ScriptedBackend::new().summary_for("a.example", "S.");
        let calls = backend.calls();
        let s = summarizer(backend, config(10, 2000));
        s.summarize_all(&ind, &pages, &storage, &SilentProgress).await.unwrap();
        let second = s.summarize_all(&ind, &pages, &storage, &SilentProgress).await.unwrap();

        assert_eq!(second.skipped_existing, 1);
        assert_eq!(second.summarized, 0);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
