//! Core domain types for SourceScout pipeline runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SourceScoutError};

// ---------------------------------------------------------------------------
// Industry
// ---------------------------------------------------------------------------

/// A validated industry identifier (e.g. `smart_manufacturing`).
///
/// Used as a directory name on disk, so only `[a-z0-9_-]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Industry(String);

impl Industry {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(SourceScoutError::validation(format!(
                "invalid industry identifier '{id}': expected lowercase letters, digits, '_' or '-'"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable name: `smart_manufacturing` → `Smart manufacturing`.
    pub fn display_name(&self) -> String {
        let spaced = self.0.replace(['_', '-'], " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Industry {
    type Err = SourceScoutError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Industry {
    type Error = SourceScoutError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Industry> for String {
    fn from(value: Industry) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Query / SearchResult
// ---------------------------------------------------------------------------

/// A single search string belonging to an industry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub industry: Industry,
}

/// A candidate source returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Normalized URL, the dedup key across an industry's whole result set.
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// The query that first produced this URL.
    pub source_query: String,
}

/// A persisted [`SearchResult`] with its stable first-seen sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub seq: u64,
    pub result: SearchResult,
}

// ---------------------------------------------------------------------------
// PageContent
// ---------------------------------------------------------------------------

/// What a fetch produced for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PageBody {
    /// Readable text extracted from the page.
    Text(String),
    /// The normalized reason the fetch produced nothing usable.
    Failed(String),
}

/// Fetched content for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub seq: u64,
    pub url: String,
    pub body: PageBody,
}

impl PageContent {
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            PageBody::Text(t) => Some(t),
            PageBody::Failed(_) => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.body {
            PageBody::Text(_) => None,
            PageBody::Failed(reason) => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// A persisted model summary of one page. This is the checkpoint artifact
/// the report stage consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Manifest sequence number the summary inherits; defines report order.
    pub seq: u64,
    pub url: String,
    pub summary_text: String,
    pub industry: Industry,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ReportEntry / Report
// ---------------------------------------------------------------------------

/// The relevance judgment attached to a [`ReportEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Kept,
    Discarded,
}

impl Verdict {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kept => "kept",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = SourceScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kept" => Ok(Self::Kept),
            "discarded" => Ok(Self::Discarded),
            other => Err(SourceScoutError::validation(format!(
                "unknown verdict '{other}'"
            ))),
        }
    }
}

/// A scored summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Sequence number of the summary this entry scores.
    pub seq: u64,
    pub url: String,
    pub summary_text: String,
    pub verdict: Verdict,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

/// The ordered report for one industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub industry: Industry,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn empty(industry: Industry) -> Self {
        Self {
            industry,
            entries: Vec::new(),
        }
    }

    pub fn kept(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.verdict == Verdict::Kept)
    }

    pub fn discarded(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.verdict == Verdict::Discarded)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A rendered report document. Derived purely from a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedDocument {
    pub markdown: String,
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Normalize a URL for deduplication (strip fragment, drop trailing slash on
/// non-root paths). Returns `None` for unparseable or non-http(s) URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    let mut s = url.to_string();
    if url.path() != "/" && url.query().is_none() && s.ends_with('/') {
        s.pop();
    }
    Some(s)
}

/// The host of a URL without a leading `www.`; falls back to the raw input.
pub fn domain_name(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn industry_validation() {
        assert!(Industry::new("smart_manufacturing").is_ok());
        assert!(Industry::new("e-commerce2").is_ok());
        assert!(Industry::new("").is_err());
        assert!(Industry::new("Smart Manufacturing").is_err());
        assert!(Industry::new("../etc").is_err());
    }

    #[test]
    fn industry_display_name() {
        let industry = Industry::new("smart_manufacturing").unwrap();
        assert_eq!(industry.display_name(), "Smart manufacturing");
        assert_eq!(industry.to_string(), "smart_manufacturing");
    }

    #[test]
    fn industry_deserialize_rejects_invalid() {
        let ok: std::result::Result<Industry, _> = serde_json::from_str(r#""venture_capital""#);
        assert!(ok.is_ok());
        let bad: std::result::Result<Industry, _> = serde_json::from_str(r#""Venture Capital""#);
        assert!(bad.is_err());
    }

    #[test]
    fn verdict_parse() {
        assert_eq!("kept".parse::<Verdict>().unwrap(), Verdict::Kept);
        assert_eq!("discarded".parse::<Verdict>().unwrap(), Verdict::Discarded);
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn normalize_strips_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/guide/#intro").as_deref(),
            Some("https://example.com/guide")
        );
        assert_eq!(
            normalize_url("https://example.com/").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(
            normalize_url("https://example.com/search?q=a").as_deref(),
            Some("https://example.com/search?q=a")
        );
        assert!(normalize_url("mailto:someone@example.com").is_none());
        assert!(normalize_url("not a url").is_none());
    }

    #[test]
    fn domain_name_strips_www() {
        assert_eq!(domain_name("https://www.example.com/a"), "example.com");
        assert_eq!(domain_name("https://docs.example.com"), "docs.example.com");
        assert_eq!(domain_name("garbage"), "garbage");
    }

    #[test]
    fn report_filters_by_verdict() {
        let industry = Industry::new("fintech").unwrap();
        let entry = |url: &str, verdict| ReportEntry {
            seq: 1,
            url: url.into(),
            summary_text: "s".into(),
            verdict,
            rationale: "r".into(),
            created_at: Utc::now(),
        };
        let report = Report {
            industry,
            entries: vec![
                entry("https://a.example", Verdict::Kept),
                entry("https://b.example", Verdict::Discarded),
            ],
        };
        assert_eq!(report.kept().count(), 1);
        assert_eq!(report.discarded().count(), 1);
    }
}
