//! Pipeline orchestration: search → fetch → summarize → score → render.
//!
//! Every stage reads its input from the industry's store and persists its
//! output before the next stage starts, so an interrupted run can always be
//! resumed, and the report stages can be re-run on their own against the
//! persisted summaries.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use sourcescout_fetcher::{ContentFetcher, FetchStats};
use sourcescout_llm::LanguageModel;
use sourcescout_search::{AggregateStats, QueryStore, SearchAggregator};
use sourcescout_shared::{
    AppConfig, FetchConfig, FormattedDocument, Industry, LlmConfig, ManifestEntry, ReportConfig,
    Result, SearchConfig, SourceScoutError,
};
use sourcescout_storage::{Storage, industry_db_path};

use crate::lock::RunLock;
use crate::render::{RenderOptions, render};
use crate::report::{GenerateStats, Generation, ReportGenerator};
use crate::summarizer::{SummarizeStats, Summarizer};

/// Directory name for written documents inside `<data_dir>/<industry>/`.
pub const REPORTS_DIR_NAME: &str = "reports";

/// Which entry point produced a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Every stage, from search to the written document.
    Full,
    /// Scoring and rendering against the persisted summaries only.
    Report,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Report => "report",
        }
    }
}

/// Outcome of one orchestrator invocation. Serialized into the run record.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub industry: Industry,
    pub kind: RunKind,
    /// Absent for report-only runs.
    pub search: Option<AggregateStats>,
    pub fetch: Option<FetchStats>,
    pub summarize: Option<SummarizeStats>,
    pub generate: GenerateStats,
    /// Report entries removed by a fresh report run.
    pub cleared: u64,
    pub kept: usize,
    pub discarded: usize,
    pub document: PathBuf,
    pub elapsed_ms: u64,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each item of a per-URL stage completes.
    fn item(&self, stage: &str, url: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _stage: &str, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Sequences the stages for one industry at a time.
pub struct Pipeline {
    aggregator: SearchAggregator,
    fetcher: ContentFetcher,
    summarizer: Summarizer,
    generator: ReportGenerator,
    data_dir: PathBuf,
    render: RenderOptions,
}

impl Pipeline {
    pub fn new(
        aggregator: SearchAggregator,
        fetcher: ContentFetcher,
        summarizer: Summarizer,
        generator: ReportGenerator,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            aggregator,
            fetcher,
            summarizer,
            generator,
            data_dir: data_dir.into(),
            render: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Build every stage from the resolved application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let search = SearchConfig::from(config);
        let provider = sourcescout_search::build_provider(&search)?;
        let aggregator = SearchAggregator::new(
            provider,
            QueryStore::new(&config.defaults.queries_dir),
            search,
        );

        let fetcher = ContentFetcher::new(FetchConfig::from(config))?;

        let llm = LlmConfig::from(config);
        let backend = sourcescout_llm::build_backend(&llm)?;
        let model = LanguageModel::new(backend, llm.timeout);
        info!(backend = model.backend_name(), model = %llm.model, "pipeline configured");
        let summarizer = Summarizer::new(model.clone(), llm);
        let generator = ReportGenerator::new(model);

        let render = RenderOptions::from(&ReportConfig::from(config));
        Ok(Self::new(
            aggregator,
            fetcher,
            summarizer,
            generator,
            &config.defaults.data_dir,
        )
        .with_render_options(render))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Run the full pipeline for `industry` and write the document.
    ///
    /// URLs that already have a summary are not fetched again.
    #[instrument(skip_all, fields(industry = %industry))]
    pub async fn run(
        &self,
        industry: &Industry,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        // Config errors abort before the store or lock exist.
        let queries = self.aggregator.load_queries(industry)?;

        let _lock = RunLock::acquire(&self.data_dir, industry)?;
        let storage = Storage::open(&industry_db_path(&self.data_dir, industry)).await?;
        let run_id = storage.insert_run(industry, RunKind::Full.as_str()).await?;

        info!(queries = queries.len(), "starting full run");

        // --- Search ---
        progress.phase("Searching");
        let aggregation = self
            .aggregator
            .aggregate_queries(industry, &queries, &storage)
            .await?;

        // --- Fetch ---
        let summarized = storage.summarized_urls(industry).await?;
        let pending: Vec<ManifestEntry> = aggregation
            .manifest
            .iter()
            .filter(|entry| !summarized.contains(&entry.result.url))
            .cloned()
            .collect();
        info!(
            manifest = aggregation.manifest.len(),
            pending = pending.len(),
            "skipping already summarized URLs"
        );

        progress.phase("Fetching pages");
        let batch = self.fetcher.fetch(industry, &pending, &storage).await?;

        // --- Summarize ---
        progress.phase("Summarizing pages");
        let summarize = self
            .summarizer
            .summarize_all(industry, &batch.pages, &storage, progress)
            .await?;

        // --- Score & render ---
        let (generation, document) = self.report_stages(industry, &storage, progress).await?;

        let summary = RunSummary {
            industry: industry.clone(),
            kind: RunKind::Full,
            search: Some(aggregation.stats),
            fetch: Some(batch.stats),
            summarize: Some(summarize),
            generate: generation.stats,
            cleared: 0,
            kept: generation.report.kept().count(),
            discarded: generation.report.discarded().count(),
            document,
            elapsed_ms: elapsed_ms(start),
        };
        self.finish(&storage, &run_id, &summary, progress).await?;
        Ok(summary)
    }

    /// Score and render from the persisted summaries only.
    ///
    /// With `fresh`, the report store is cleared first so every summary is
    /// scored exactly once in this pass.
    #[instrument(skip_all, fields(industry = %industry, fresh = fresh))]
    pub async fn run_report(
        &self,
        industry: &Industry,
        fresh: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let _lock = RunLock::acquire(&self.data_dir, industry)?;
        let storage = Storage::open(&industry_db_path(&self.data_dir, industry)).await?;
        let run_id = storage.insert_run(industry, RunKind::Report.as_str()).await?;

        info!("starting report run");

        let cleared = if fresh {
            progress.phase("Clearing report");
            self.generator.clear(industry, &storage).await?
        } else {
            0
        };

        let (generation, document) = self.report_stages(industry, &storage, progress).await?;

        let summary = RunSummary {
            industry: industry.clone(),
            kind: RunKind::Report,
            search: None,
            fetch: None,
            summarize: None,
            generate: generation.stats,
            cleared,
            kept: generation.report.kept().count(),
            discarded: generation.report.discarded().count(),
            document,
            elapsed_ms: elapsed_ms(start),
        };
        self.finish(&storage, &run_id, &summary, progress).await?;
        Ok(summary)
    }

    async fn report_stages(
        &self,
        industry: &Industry,
        storage: &Storage,
        progress: &dyn ProgressReporter,
    ) -> Result<(Generation, PathBuf)> {
        progress.phase("Scoring sources");
        let generation = self.generator.generate(industry, storage, progress).await?;

        progress.phase("Writing report");
        let doc = render(&generation.report, self.render);
        let path = write_document(&self.data_dir, industry, &doc)?;
        Ok((generation, path))
    }

    async fn finish(
        &self,
        storage: &Storage,
        run_id: &str,
        summary: &RunSummary,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let stats = serde_json::to_string(summary)
            .map_err(|e| SourceScoutError::validation(format!("failed to serialize run stats: {e}")))?;
        storage.finish_run(run_id, &stats).await?;
        progress.done(summary);

        info!(
            kept = summary.kept,
            discarded = summary.discarded,
            document = %summary.document.display(),
            elapsed_ms = summary.elapsed_ms,
            "run complete"
        );
        Ok(())
    }
}

/// Render the persisted report without writing to the store.
pub async fn render_stored(
    data_dir: &Path,
    industry: &Industry,
    options: RenderOptions,
) -> Result<FormattedDocument> {
    let storage = Storage::open_readonly(&industry_db_path(data_dir, industry)).await?;
    let report = storage.list_report(industry).await?;
    Ok(render(&report, options))
}

/// Directory holding an industry's written documents.
pub fn reports_dir(data_dir: &Path, industry: &Industry) -> PathBuf {
    data_dir.join(industry.as_str()).join(REPORTS_DIR_NAME)
}

/// Write a document as `<industry>_total_report_<timestamp>.md`.
pub fn write_document(
    data_dir: &Path,
    industry: &Industry,
    doc: &FormattedDocument,
) -> Result<PathBuf> {
    let dir = reports_dir(data_dir, industry);
    std::fs::create_dir_all(&dir).map_err(|e| SourceScoutError::io(&dir, e))?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{industry}_total_report_{stamp}.md"));
    std::fs::write(&path, &doc.markdown).map_err(|e| SourceScoutError::io(&path, e))?;
    Ok(path)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
