//! The search provider seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use sourcescout_shared::{Result, SourceScoutError};

/// One unprocessed hit as the provider returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl RawHit {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// A web search backend. One call per query; failures are per query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run one query and return hits in provider rank order.
    async fn search(&self, query: &str) -> Result<Vec<RawHit>>;
}

/// Build a reqwest client for search requests.
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(3))
        .timeout(timeout)
        .build()
        .map_err(|e| SourceScoutError::provider(format!("failed to build HTTP client: {e}")))
}
