//! Relevance scoring of persisted summaries.
//!
//! Reads only the summary store and is the only writer of the report store.
//! URLs that already have a report entry are never re-scored, so generation
//! can be interrupted and re-run at any point.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use sourcescout_llm::LanguageModel;
use sourcescout_shared::{Industry, Report, ReportEntry, Result, Verdict};
use sourcescout_storage::Storage;

use crate::pipeline::ProgressReporter;

/// Rationale recorded when the model's response could not be used.
pub const SCORING_FAILED: &str = "scoring failed";

/// Counters for one generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerateStats {
    pub scored: usize,
    pub kept: usize,
    pub discarded: usize,
    pub scoring_failed: usize,
    pub skipped_existing: usize,
}

/// The report after a generation pass, plus what the pass did.
#[derive(Debug, Clone)]
pub struct Generation {
    pub report: Report,
    pub stats: GenerateStats,
}

pub struct ReportGenerator {
    model: LanguageModel,
}

impl ReportGenerator {
    pub fn new(model: LanguageModel) -> Self {
        Self { model }
    }

    /// Score every summary that has no report entry yet, in summary order.
    #[instrument(skip_all, fields(industry = %industry))]
    pub async fn generate(
        &self,
        industry: &Industry,
        storage: &Storage,
        progress: &dyn ProgressReporter,
    ) -> Result<Generation> {
        let summaries = storage.list_summaries(industry).await?;
        let scored = storage.scored_urls(industry).await?;
        let mut stats = GenerateStats::default();

        let pending: Vec<_> = summaries
            .iter()
            .filter(|s| {
                let done = scored.contains(&s.url);
                if done {
                    stats.skipped_existing += 1;
                }
                !done
            })
            .collect();

        info!(
            summaries = summaries.len(),
            pending = pending.len(),
            "generating report"
        );

        let total = pending.len();
        for (i, summary) in pending.into_iter().enumerate() {
            progress.item("score", &summary.url, i + 1, total);

            let (verdict, rationale) = match self
                .model
                .score(industry, &summary.url, &summary.summary_text)
                .await
            {
                Ok(judgment) => (judgment.verdict, judgment.rationale),
                Err(e) => {
                    warn!(url = %summary.url, error = %e, "scoring failed, discarding");
                    stats.scoring_failed += 1;
                    (Verdict::Discarded, SCORING_FAILED.to_string())
                }
            };

            let entry = ReportEntry {
                seq: summary.seq,
                url: summary.url.clone(),
                summary_text: summary.summary_text.clone(),
                verdict,
                rationale,
                created_at: Utc::now(),
            };

            if !storage.append_report_entry(industry, &entry).await? {
                stats.skipped_existing += 1;
                continue;
            }

            stats.scored += 1;
            match verdict {
                Verdict::Kept => stats.kept += 1,
                Verdict::Discarded => stats.discarded += 1,
            }
        }

        let report = storage.list_report(industry).await?;
        info!(
            scored = stats.scored,
            kept = stats.kept,
            discarded = stats.discarded,
            scoring_failed = stats.scoring_failed,
            "report generated"
        );

        Ok(Generation { report, stats })
    }

    /// Drop every report entry so the next pass scores from scratch.
    #[instrument(skip_all, fields(industry = %industry))]
    pub async fn clear(&self, industry: &Industry, storage: &Storage) -> Result<u64> {
        let removed = storage.clear_report(industry).await?;
        info!(removed, "cleared report store");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use sourcescout_shared::Summary;

    use crate::pipeline::SilentProgress;
    use crate::testing::{ScriptedBackend, industry, storage};

    async fn seed(storage: &Storage, entries: &[(u64, &str)]) {
        for (seq, url) in entries {
            storage
                .insert_summary(&Summary {
                    seq: *seq,
                    url: (*url).into(),
                    summary_text: format!("About {url}"),
                    industry: industry(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    fn generator(backend: ScriptedBackend) -> ReportGenerator {
        ReportGenerator::new(LanguageModel::new(Arc::new(backend), Duration::from_secs(2)))
    }

    fn backend() -> ScriptedBackend {
        ScriptedBackend::new()
            .score_for("a.example", r#"{"reliable": "Yes", "reason": "Industry case studies."}"#)
            .score_for("b.example", r#"{"reliable": "No", "reason": "Marketing copy."}"#)
    }

    #[tokio::test]
    async fn scores_in_summary_order() {
        let storage = storage().await;
        seed(&storage, &[(2, "https://b.example/"), (1, "https://a.example/")]).await;

        let result = generator(backend())
            .generate(&industry(), &storage, &SilentProgress)
            .await
            .unwrap();

        let urls: Vec<_> = result.report.entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["https://a.example/", "https://b.example/"]);
        assert_eq!(result.report.entries[0].verdict, Verdict::Kept);
        assert_eq!(result.report.entries[0].rationale, "Industry case studies.");
        assert_eq!(result.report.entries[1].verdict, Verdict::Discarded);
        assert_eq!(result.stats.kept, 1);
        assert_eq!(result.stats.discarded, 1);
    }

    #[tokio::test]
    async fn generating_twice_yields_one_entry_per_url() {
        let storage = storage().await;
        seed(&storage, &[(1, "https://a.example/"), (2, "https://b.example/")]).await;

        let b = backend();
        let calls = b.calls();
        let generator = generator(b);
        generator.generate(&industry(), &storage, &SilentProgress).await.unwrap();
        let second = generator.generate(&industry(), &storage, &SilentProgress).await.unwrap();

        assert_eq!(second.report.entries.len(), 2);
        assert_eq!(second.stats.scored, 0);
        assert_eq!(second.stats.skipped_existing, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn interrupted_generation_scores_only_the_rest() {
        let storage = storage().await;
        seed(
            &storage,
            &[(1, "https://a.example/"), (2, "https://b.example/"), (3, "https://c.example/")],
        )
        .await;
        // A previous pass got through the first summary only.
        storage
            .append_report_entry(
                &industry(),
                &ReportEntry {
                    seq: 1,
                    url: "https://a.example/".into(),
                    summary_text: "About https://a.example/".into(),
                    verdict: Verdict::Kept,
                    rationale: "earlier".into(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let b = backend();
        let calls = b.calls();
        let result = generator(b)
            .generate(&industry(), &storage, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.stats.skipped_existing, 1);
        assert_eq!(result.report.entries.len(), 3);
        assert_eq!(result.report.entries[0].rationale, "earlier");
    }

    #[tokio::test]
    async fn malformed_or_failed_scores_are_discarded() {
        let storage = storage().await;
        seed(&storage, &[(1, "https://garbled.example/"), (2, "https://down.example/")]).await;

        let b = ScriptedBackend::new()
            .score_for("garbled.example", "Sure! The source looks fine to me.")
            .failure_for("down.example");
        let result = generator(b)
            .generate(&industry(), &storage, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(result.stats.scoring_failed, 2);
        for entry in &result.report.entries {
            assert_eq!(entry.verdict, Verdict::Discarded);
            assert_eq!(entry.rationale, SCORING_FAILED);
        }
    }

    #[tokio::test]
    async fn clear_allows_fresh_rescore() {
        let storage = storage().await;
        seed(&storage, &[(1, "https://a.example/")]).await;

        let b = backend();
        let calls = b.calls();
        let generator = generator(b);
        generator.generate(&industry(), &storage, &SilentProgress).await.unwrap();
        assert_eq!(generator.clear(&industry(), &storage).await.unwrap(), 1);
        let fresh = generator.generate(&industry(), &storage, &SilentProgress).await.unwrap();

        assert_eq!(fresh.stats.scored, 1);
        assert_eq!(fresh.report.entries.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
