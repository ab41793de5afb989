//! Language-model access for SourceScout.
//!
//! A [`CompletionBackend`] turns one prompt into raw text; [`LanguageModel`]
//! wraps a backend with timeouts and exposes the two call shapes the pipeline
//! needs: page summarization and relevance scoring.

mod backend;
mod model;
mod ollama;
mod openrouter;
pub mod prompts;
mod score;

use std::sync::Arc;

use sourcescout_shared::{LlmConfig, LlmProvider, Result};

pub use backend::{CompletionBackend, CompletionRequest, ResponseFormat};
pub use model::LanguageModel;
pub use ollama::OllamaClient;
pub use openrouter::OpenRouterClient;
pub use score::{Judgment, parse_judgment};

/// Build the backend selected in config.
pub fn build_backend(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>> {
    let backend: Arc<dyn CompletionBackend> = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        LlmProvider::Openrouter => Arc::new(OpenRouterClient::new(config)?),
    };
    tracing::debug!(backend = backend.name(), model = %config.model, "language model ready");
    Ok(backend)
}
