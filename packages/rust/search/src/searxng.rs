//! SearxNG JSON API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use sourcescout_shared::{Result, SearchConfig, SourceScoutError};

use crate::provider::{RawHit, SearchProvider, build_client};

const USER_AGENT: &str = concat!("SourceScout/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxHit>,
}

#[derive(Debug, Deserialize)]
struct SearxHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Queries `GET {endpoint}/search?q=..&format=json`.
pub struct SearxngProvider {
    client: Client,
    endpoint: String,
}

impl SearxngProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, config.timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str) -> Result<Vec<RawHit>> {
        let url = format!("{}/search", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| SourceScoutError::provider(format!("searxng request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceScoutError::provider(format!("searxng returned HTTP {status}")));
        }

        let body: SearxResponse = response
            .json()
            .await
            .map_err(|e| SourceScoutError::parse(format!("invalid searxng response: {e}")))?;

        debug!(hits = body.results.len(), "searxng results");

        Ok(body
            .results
            .into_iter()
            .map(|hit| RawHit::new(hit.url, hit.title.trim(), hit.content.trim()))
            .collect())
    }
}
