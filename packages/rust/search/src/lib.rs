//! Search stage for SourceScout.
//!
//! Loads an industry's query collection ([`QueryStore`]), runs every query
//! against a [`SearchProvider`], and merges the hits into the persisted,
//! deduplicated manifest ([`SearchAggregator`]).

mod aggregator;
mod google;
mod provider;
mod queries;
mod searxng;

use std::sync::Arc;

use sourcescout_shared::{Result, SearchConfig, SearchProviderKind};

pub use aggregator::{AggregateStats, Aggregation, SearchAggregator};
pub use google::{GoogleProvider, parse_results_page};
pub use provider::{RawHit, SearchProvider};
pub use queries::QueryStore;
pub use searxng::SearxngProvider;

/// Build the provider selected in config.
pub fn build_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    let provider: Arc<dyn SearchProvider> = match config.provider {
        SearchProviderKind::Searxng => Arc::new(SearxngProvider::new(config)?),
        SearchProviderKind::Google => Arc::new(GoogleProvider::new(config)?),
    };
    tracing::debug!(provider = provider.name(), endpoint = %config.endpoint, "search provider ready");
    Ok(provider)
}
