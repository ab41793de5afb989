//! Test doubles shared by the stage tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sourcescout_llm::{CompletionBackend, CompletionRequest, ResponseFormat};
use sourcescout_search::{RawHit, SearchProvider};
use sourcescout_shared::{Industry, Result, SourceScoutError};
use sourcescout_storage::Storage;

pub(crate) fn industry() -> Industry {
    Industry::new("smart_manufacturing").unwrap()
}

pub(crate) async fn storage() -> Storage {
    let path = std::env::temp_dir().join(format!("ss_core_{}.db", uuid::Uuid::now_v7()));
    Storage::open(&path).await.unwrap()
}

/// Returns canned hits per query; unknown queries fail.
#[derive(Default)]
pub(crate) struct ScriptedSearch {
    answers: HashMap<String, Vec<RawHit>>,
}

impl ScriptedSearch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn answer(mut self, query: &str, hits: Vec<RawHit>) -> Self {
        self.answers.insert(query.into(), hits);
        self
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawHit>> {
        self.answers
            .get(query)
            .cloned()
            .ok_or_else(|| SourceScoutError::provider(format!("no scripted answer for '{query}'")))
    }
}

/// Answers prompts by looking for marker substrings (usually part of a URL
/// or page text) in the prompt.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    summaries: Vec<(String, String)>,
    scores: Vec<(String, String)>,
    failures: Vec<String>,
    panics: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn summary_for(mut self, marker: &str, summary: &str) -> Self {
        self.summaries.push((marker.into(), summary.into()));
        self
    }

    pub(crate) fn score_for(mut self, marker: &str, raw: &str) -> Self {
        self.scores.push((marker.into(), raw.into()));
        self
    }

    pub(crate) fn failure_for(mut self, marker: &str) -> Self {
        self.failures.push(marker.into());
        self
    }

    pub(crate) fn panic_for(mut self, marker: &str) -> Self {
        self.panics.push(marker.into());
        self
    }

    /// Shared call counter, readable after the backend is moved.
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.prompt.as_str();

        if self.panics.iter().any(|m| prompt.contains(m.as_str())) {
            panic!("scripted backend crashed");
        }
        if self.failures.iter().any(|m| prompt.contains(m.as_str())) {
            return Err(SourceScoutError::provider("scripted failure"));
        }

        let table = match request.format {
            ResponseFormat::Text => &self.summaries,
            ResponseFormat::Json => &self.scores,
        };
        let answer = table
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, answer)| answer.clone());

        Ok(answer.unwrap_or_else(|| match request.format {
            ResponseFormat::Text => "Generic summary.".to_string(),
            ResponseFormat::Json => "I am unable to help with that.".to_string(),
        }))
    }
}
