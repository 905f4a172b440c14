pub mod gemini;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use tracing::{error, info, warn};

use crate::errors::AppError;

pub use gemini::GeminiAgentService;

/// Ordered, finite text fragments of one completion. An `Err` item ends it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// A streaming text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a completion for `prompt`. Failing here means nothing was
    /// produced yet.
    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream, AppError>;

    /// Names of the models the configured credential can use.
    async fn list_models(&self) -> Result<Vec<String>, AppError>;
}

/// Logs the models visible to the configured credential. Diagnostic only.
pub async fn log_available_models(provider: Arc<dyn CompletionProvider>) {
    match provider.list_models().await {
        Ok(models) if models.is_empty() => {
            warn!("No models found. Check if your API key is correct.");
        }
        Ok(models) => {
            info!("Available models: {}", models.len());
            for model in models {
                info!("  {model}");
            }
        }
        Err(e) => error!("Could not list models: {e}"),
    }
}
