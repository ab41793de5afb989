//! Application configuration for SourceScout.
//!
//! User config lives at `~/.sourcescout/sourcescout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceScoutError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sourcescout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sourcescout";

// ---------------------------------------------------------------------------
// Config structs (matching sourcescout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage and query locations.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchSection,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Language model settings.
    #[serde(default)]
    pub llm: LlmSection,

    /// Report rendering settings.
    #[serde(default)]
    pub report: ReportSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for per-industry stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory holding `<industry>.json` query collections.
    #[serde(default = "default_queries_dir")]
    pub queries_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            queries_dir: default_queries_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "var/industries".into()
}
fn default_queries_dir() -> String {
    "search_queries".into()
}

/// Which search backend to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// A SearxNG instance's JSON API.
    Searxng,
    /// Scraped Google result pages.
    Google,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProviderKind,

    /// Base URL of the search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Maximum results kept per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Number of leading provider results to skip.
    #[serde(default)]
    pub result_offset: usize,

    /// Concurrent search requests.
    #[serde(default = "default_search_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Delay before each search request, in ms.
    #[serde(default)]
    pub rate_limit_ms: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            endpoint: default_search_endpoint(),
            results_per_query: default_results_per_query(),
            result_offset: 0,
            concurrency: default_search_concurrency(),
            timeout_secs: default_search_timeout(),
            rate_limit_ms: 0,
        }
    }
}

fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::Searxng
}
fn default_search_endpoint() -> String {
    "http://127.0.0.1:8888".into()
}
fn default_results_per_query() -> usize {
    6
}
fn default_search_concurrency() -> usize {
    8
}
fn default_search_timeout() -> u64 {
    20
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,

    /// Pages with less extracted text than this are not summarized.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Bodies larger than this are rejected.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Permit loopback/private targets (local test servers only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            concurrency: default_fetch_concurrency(),
            min_content_chars: default_min_content_chars(),
            max_body_bytes: default_max_body_bytes(),
            allow_private_hosts: false,
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}
fn default_fetch_concurrency() -> usize {
    8
}
fn default_min_content_chars() -> usize {
    200
}
fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

/// Which language model backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// A local Ollama server.
    Ollama,
    /// OpenRouter (OpenAI-compatible chat completions).
    Openrouter,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Concurrent summarize calls.
    #[serde(default = "default_summarize_concurrency")]
    pub summarize_concurrency: usize,

    /// Page text beyond this many chars is truncated before summarizing.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Summaries are capped at this many chars.
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
            summarize_concurrency: default_summarize_concurrency(),
            max_input_chars: default_max_input_chars(),
            max_summary_chars: default_max_summary_chars(),
        }
    }
}

fn default_llm_provider() -> LlmProvider {
    LlmProvider::Ollama
}
fn default_llm_base_url() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_model() -> String {
    "llama3:instruct".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_summarize_concurrency() -> usize {
    3
}
fn default_max_input_chars() -> usize {
    12_000
}
fn default_max_summary_chars() -> usize {
    2_000
}

/// `[report]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSection {
    /// Render discarded entries as an extra table.
    #[serde(default)]
    pub include_discarded: bool,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub provider: SearchProviderKind,
    pub endpoint: String,
    pub results_per_query: usize,
    pub result_offset: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    pub rate_limit_ms: u64,
}

impl From<&AppConfig> for SearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            provider: config.search.provider,
            endpoint: config.search.endpoint.clone(),
            results_per_query: config.search.results_per_query,
            result_offset: config.search.result_offset,
            concurrency: config.search.concurrency.max(1),
            timeout: Duration::from_secs(config.search.timeout_secs),
            rate_limit_ms: config.search.rate_limit_ms,
        }
    }
}

/// Runtime page fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub concurrency: usize,
    pub max_body_bytes: usize,
    pub allow_private_hosts: bool,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            concurrency: config.fetch.concurrency.max(1),
            max_body_bytes: config.fetch.max_body_bytes,
            allow_private_hosts: config.fetch.allow_private_hosts,
        }
    }
}

/// Runtime language model configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout: Duration,
    pub summarize_concurrency: usize,
    pub min_content_chars: usize,
    pub max_input_chars: usize,
    pub max_summary_chars: usize,
}

impl From<&AppConfig> for LlmConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            provider: config.llm.provider,
            base_url: config.llm.base_url.clone(),
            model: config.llm.model.clone(),
            api_key_env: config.llm.api_key_env.clone(),
            timeout: Duration::from_secs(config.llm.timeout_secs),
            summarize_concurrency: config.llm.summarize_concurrency.max(1),
            min_content_chars: config.fetch.min_content_chars,
            max_input_chars: config.llm.max_input_chars,
            max_summary_chars: config.llm.max_summary_chars,
        }
    }
}

/// Runtime report rendering configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportConfig {
    pub include_discarded: bool,
}

impl From<&AppConfig> for ReportConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            include_discarded: config.report.include_discarded,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sourcescout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SourceScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sourcescout/sourcescout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SourceScoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SourceScoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| SourceScoutError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SourceScoutError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| SourceScoutError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

/// Check that the OpenRouter API key env var is set and non-empty.
/// Local Ollama needs no key.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    if config.llm.provider != LlmProvider::Openrouter {
        return Ok(());
    }
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(SourceScoutError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("llama3:instruct"));
        assert!(toml_str.contains("provider = \"searxng\""));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[search]
provider = "google"
result_offset = 3

[llm]
provider = "openrouter"
model = "meta-llama/llama-3-8b-instruct"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.search.provider, SearchProviderKind::Google);
        assert_eq!(config.search.result_offset, 3);
        assert_eq!(config.search.results_per_query, 6);
        assert_eq!(config.llm.provider, LlmProvider::Openrouter);
        assert_eq!(config.llm.summarize_concurrency, 3);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert!(!config.report.include_discarded);
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let mut app = AppConfig::default();
        app.fetch.concurrency = 0;
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.concurrency, 1);
        assert_eq!(fetch.timeout, Duration::from_secs(10));

        let llm = LlmConfig::from(&app);
        assert_eq!(llm.min_content_chars, 200);
        assert_eq!(llm.max_input_chars, 12_000);
    }

    #[test]
    fn api_key_not_needed_for_ollama() {
        let config = AppConfig::default();
        assert!(validate_api_key(&config).is_ok());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Openrouter;
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "SS_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn init_config_at_writes_loadable_file() {
        let path = std::env::temp_dir()
            .join(format!("ss-config-{}", std::process::id()))
            .join("sourcescout.toml");
        init_config_at(&path).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.llm.model, "llama3:instruct");
        let _ = std::fs::remove_file(&path);
    }
}
