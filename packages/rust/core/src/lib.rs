//! Core pipeline orchestration and domain logic for SourceScout.
//!
//! This crate ties the search, fetch, and model crates together into the
//! per-industry workflows: the summarize and scoring stages, the report
//! renderer, the run lock, and the [`Pipeline`] that sequences them.

pub mod lock;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod summarizer;

#[cfg(test)]
mod testing;

pub use lock::{LOCK_FILE_NAME, RunLock, lock_path};
pub use pipeline::{
    Pipeline, ProgressReporter, REPORTS_DIR_NAME, RunKind, RunSummary, SilentProgress,
    render_stored, reports_dir, write_document,
};
pub use render::{RenderOptions, render};
pub use report::{GenerateStats, Generation, ReportGenerator, SCORING_FAILED};
pub use summarizer::{SkipReason, SummarizeStats, Summarizer};
