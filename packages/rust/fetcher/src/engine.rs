//! Concurrent page fetcher.
//!
//! Fetches manifest URLs on a semaphore-bounded pool with a per-request
//! timeout, classifies every failure into a short reason string, and records
//! each outcome in the fetch log.

use std::net::IpAddr;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sourcescout_shared::{
    FetchConfig, Industry, ManifestEntry, PageBody, PageContent, Result, SourceScoutError,
};
use sourcescout_storage::Storage;

use crate::extract;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("SourceScout/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per page.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// FetchBatch
// ---------------------------------------------------------------------------

/// Counters for one fetch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Every fetched page in manifest `seq` order.
#[derive(Debug, Clone)]
pub struct FetchBatch {
    pub pages: Vec<PageContent>,
    pub stats: FetchStats,
}

// ---------------------------------------------------------------------------
// ContentFetcher
// ---------------------------------------------------------------------------

/// Retrieves page text for manifest entries. Owns the fetch log.
pub struct ContentFetcher {
    config: FetchConfig,
    client: Client,
}

impl ContentFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceScoutError::provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch every entry and record the outcomes for `industry`.
    ///
    /// Individual page failures become [`PageBody::Failed`]; only storage
    /// errors abort the pass.
    #[instrument(skip_all, fields(industry = %industry, entries = entries.len()))]
    pub async fn fetch(
        &self,
        industry: &Industry,
        entries: &[ManifestEntry],
        storage: &Storage,
    ) -> Result<FetchBatch> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(entries.len());

        info!(concurrency = self.config.concurrency, "fetching pages");

        for entry in entries {
            let client = self.client.clone();
            let sem = Arc::clone(&semaphore);
            let url = entry.result.url.clone();
            let max_bytes = self.config.max_body_bytes;
            let allow_private = self.config.allow_private_hosts;

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                fetch_page(&client, &url, max_bytes, allow_private).await
            }));
        }

        let mut pages = Vec::with_capacity(entries.len());
        let mut stats = FetchStats {
            attempted: entries.len(),
            ..Default::default()
        };

        for (entry, handle) in entries.iter().zip(handles) {
            let body = handle
                .await
                .unwrap_or_else(|e| PageBody::Failed(format!("fetch task failed: {e}")));

            let page = PageContent {
                seq: entry.seq,
                url: entry.result.url.clone(),
                body,
            };

            match &page.body {
                PageBody::Text(text) => {
                    stats.succeeded += 1;
                    debug!(url = %page.url, chars = text.len(), "page fetched");
                }
                PageBody::Failed(reason) => {
                    stats.failed += 1;
                    warn!(url = %page.url, reason = %reason, "page fetch failed");
                }
            }

            let hash = page.text().map(compute_hash);
            storage
                .record_fetch(industry, &page, hash.as_deref())
                .await?;
            pages.push(page);
        }

        pages.sort_by_key(|p| p.seq);

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            "fetch complete"
        );

        Ok(FetchBatch { pages, stats })
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch one URL and reduce it to text, or to the reason it produced none.
async fn fetch_page(client: &Client, raw_url: &str, max_bytes: usize, allow_private: bool) -> PageBody {
    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(e) => return PageBody::Failed(format!("invalid url: {e}")),
    };

    if !allow_private && is_ssrf_target(&url) {
        return PageBody::Failed("blocked private host".into());
    }

    let mut response = match client.get(url.as_str()).send().await {
        Ok(resp) => resp,
        Err(e) if e.is_timeout() => return PageBody::Failed("timeout".into()),
        Err(e) => return PageBody::Failed(format!("network error: {e}")),
    };

    let status = response.status();
    if !status.is_success() {
        return PageBody::Failed(format!("HTTP {}", status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();
    let kind = match classify_content_type(&content_type) {
        Some(kind) => kind,
        None => return PageBody::Failed(format!("unsupported content type: {content_type}")),
    };

    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return PageBody::Failed(format!("body too large ({len} bytes)"));
        }
    }

    // Content-Length may be absent, so enforce the cap while reading.
    let mut bytes = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if bytes.len() + chunk.len() > max_bytes {
                    return PageBody::Failed(format!("body too large (over {max_bytes} bytes)"));
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) if e.is_timeout() => return PageBody::Failed("timeout".into()),
            Err(e) => return PageBody::Failed(format!("body read failed: {e}")),
        }
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return PageBody::Failed("empty body".into());
    }

    let body = String::from_utf8_lossy(&bytes);
    let text = match kind {
        ContentKind::Html => match extract::html_to_text(&body) {
            Ok(text) => text,
            Err(e) => return PageBody::Failed(e.to_string()),
        },
        ContentKind::Text => extract::normalize_whitespace(&body),
    };

    if text.is_empty() {
        return PageBody::Failed("no readable text".into());
    }
    PageBody::Text(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Html,
    Text,
}

/// Missing content types are treated as HTML, as browsers do.
fn classify_content_type(content_type: &str) -> Option<ContentKind> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "" | "text/html" | "application/xhtml+xml" => Some(ContentKind::Html),
        m if m.starts_with("text/") => Some(ContentKind::Text),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
