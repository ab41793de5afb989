//! Concurrent query fan-out and manifest merge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use sourcescout_shared::{
    Industry, ManifestEntry, Query, Result, SearchConfig, SearchResult, SourceScoutError,
    normalize_url,
};
use sourcescout_storage::Storage;

use crate::provider::{RawHit, SearchProvider};
use crate::queries::QueryStore;

/// Per-run search counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub queries_attempted: usize,
    pub queries_failed: usize,
    pub duplicates_dropped: usize,
    pub new_entries: usize,
}

/// The full persisted manifest after a search round.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Every manifest entry for the industry, in `seq` order.
    pub manifest: Vec<ManifestEntry>,
    pub stats: AggregateStats,
}

/// Runs an industry's queries and owns its search manifest.
pub struct SearchAggregator {
    provider: Arc<dyn SearchProvider>,
    queries: QueryStore,
    config: SearchConfig,
}

impl SearchAggregator {
    pub fn new(provider: Arc<dyn SearchProvider>, queries: QueryStore, config: SearchConfig) -> Self {
        Self {
            provider,
            queries,
            config,
        }
    }

    /// Search every query for `industry` and persist new, deduplicated results.
    ///
    /// Failed queries are logged and skipped. Hits are merged in query order
    /// and URLs already in the manifest are never re-added.
    pub async fn aggregate(&self, industry: &Industry, storage: &Storage) -> Result<Aggregation> {
        let queries = self.load_queries(industry)?;
        self.aggregate_queries(industry, &queries, storage).await
    }

    /// Resolve the industry's query collection without touching any store.
    pub fn load_queries(&self, industry: &Industry) -> Result<Vec<Query>> {
        let queries = self.queries.load(industry)?;
        debug!(dir = %self.queries.dir().display(), count = queries.len(), "queries loaded");
        Ok(queries)
    }

    /// Search already-loaded `queries` and persist new, deduplicated results.
    #[instrument(skip_all, fields(industry = %industry, queries = queries.len()))]
    pub async fn aggregate_queries(
        &self,
        industry: &Industry,
        queries: &[Query],
        storage: &Storage,
    ) -> Result<Aggregation> {
        let mut stats = AggregateStats {
            queries_attempted: queries.len(),
            ..Default::default()
        };

        info!(queries = queries.len(), provider = self.provider.name(), "searching");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let rate_limit = Duration::from_millis(self.config.rate_limit_ms);
        let mut handles = Vec::with_capacity(queries.len());

        for query in queries {
            let provider = Arc::clone(&self.provider);
            let sem = Arc::clone(&semaphore);
            let text = query.text.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| SourceScoutError::provider(format!("semaphore closed: {e}")))?;
                if !rate_limit.is_zero() {
                    tokio::time::sleep(rate_limit).await;
                }
                provider.search(&text).await
            }));
        }

        // Awaiting handles in spawn order keeps the merge in query order.
        let mut per_query: Vec<(String, Vec<RawHit>)> = Vec::with_capacity(queries.len());
        for (query, handle) in queries.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SourceScoutError::provider(format!("search task panicked: {e}"))),
            };
            match outcome {
                Ok(hits) => per_query.push((query.text.clone(), hits)),
                Err(e) => {
                    warn!(query = %query.text, error = %e, "search failed, skipping query");
                    stats.queries_failed += 1;
                }
            }
        }

        let mut seen = storage.manifest_urls(industry).await?;
        let fresh = merge_hits(
            per_query,
            &mut seen,
            self.config.result_offset,
            self.config.results_per_query,
            &mut stats,
        );

        stats.new_entries = storage.append_manifest(industry, &fresh).await?;
        let manifest = storage.list_manifest(industry).await?;

        info!(
            new = stats.new_entries,
            total = manifest.len(),
            failed_queries = stats.queries_failed,
            duplicates = stats.duplicates_dropped,
            "search complete"
        );

        Ok(Aggregation { manifest, stats })
    }
}

/// Slice and normalize each query's hits, dropping URLs already in `seen`.
fn merge_hits(
    per_query: Vec<(String, Vec<RawHit>)>,
    seen: &mut HashSet<String>,
    offset: usize,
    per_query_limit: usize,
    stats: &mut AggregateStats,
) -> Vec<SearchResult> {
    let mut merged = Vec::new();
    for (query, hits) in per_query {
        let window = hits
            .into_iter()
            .filter_map(|hit| normalize_url(&hit.url).map(|url| (url, hit)))
            .skip(offset)
            .take(per_query_limit);

        for (url, hit) in window {
            if !seen.insert(url.clone()) {
                stats.duplicates_dropped += 1;
                continue;
            }
            merged.push(SearchResult {
                url,
                title: hit.title,
                snippet: hit.snippet,
                source_query: query.clone(),
            });
        }
    }
    merged
}
