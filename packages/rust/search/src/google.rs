//! Google results-page scraper.
//!
//! Requests `{endpoint}/search?q=..&num=..` with a browser user agent and reads
//! the organic result blocks out of the HTML. Google changes this markup
//! often; an unrecognized page yields zero hits rather than an error.

use std::sync::LazyLock;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use sourcescout_shared::{Result, SearchConfig, SourceScoutError};

use crate::provider::{RawHit, SearchProvider, build_client};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// How many ancestors of a link block to search for its snippet.
const SNIPPET_SEARCH_DEPTH: usize = 4;

static RESULT_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.yuRUbf").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.VwiC3b").unwrap());

pub struct GoogleProvider {
    client: Client,
    endpoint: String,
    num: usize,
}

impl GoogleProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(BROWSER_USER_AGENT, config.timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            num: config.result_offset + config.results_per_query,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str) -> Result<Vec<RawHit>> {
        let url = format!("{}/search", self.endpoint);
        let num = self.num.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("num", num.as_str())])
            .send()
            .await
            .map_err(|e| SourceScoutError::provider(format!("google request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceScoutError::provider(format!("google returned HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceScoutError::provider(format!("failed to read google response: {e}")))?;

        let hits = parse_results_page(&html);
        if hits.is_empty() {
            warn!("no result blocks found on google page");
        } else {
            debug!(hits = hits.len(), "google results");
        }
        Ok(hits)
    }
}

/// Extract organic results from a Google results page, in page order.
/// Only absolute http(s) links are returned.
pub fn parse_results_page(html: &str) -> Vec<RawHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for block in document.select(&RESULT_LINK) {
        let Some(href) = block
            .select(&ANCHOR)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        if !href.starts_with("http://") && !href.starts_with("https://") {
            continue;
        }

        let title = block
            .select(&TITLE)
            .next()
            .map(collapse_text)
            .unwrap_or_default();

        hits.push(RawHit::new(href, title, find_snippet(block)));
    }
    hits
}

/// The snippet lives in a sibling subtree of the link block. Walk up a few
/// ancestors, stopping before one that spans another result.
fn find_snippet(block: ElementRef<'_>) -> String {
    for ancestor in block
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(SNIPPET_SEARCH_DEPTH)
    {
        if ancestor.select(&RESULT_LINK).count() > 1 {
            break;
        }
        if let Some(snippet) = ancestor.select(&SNIPPET).next() {
            return collapse_text(snippet);
        }
    }
    String::new()
}

fn collapse_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
