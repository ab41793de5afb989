//! Shared types, error model, and configuration for SourceScout.
//!
//! This crate is the foundation depended on by all other SourceScout crates.
//! It provides:
//! - [`SourceScoutError`]: the unified error type
//! - Domain types ([`Industry`], [`SearchResult`], [`Summary`], [`ReportEntry`], ...)
//! - Configuration ([`AppConfig`] and the per-stage runtime configs)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, FetchSection, LlmConfig, LlmProvider, LlmSection,
    ReportConfig, ReportSection, SearchConfig, SearchProviderKind, SearchSection, config_dir,
    config_file_path, init_config, init_config_at, load_config, load_config_from,
    validate_api_key,
};
pub use error::{Result, SourceScoutError};
pub use types::{
    FormattedDocument, Industry, ManifestEntry, PageBody, PageContent, Query, Report, ReportEntry,
    SearchResult, Summary, Verdict, domain_name, normalize_url,
};
