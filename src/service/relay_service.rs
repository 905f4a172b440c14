use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::debug;

use crate::agent::{CompletionProvider, FragmentStream};
use crate::errors::AppError;

/// Relays prompts to the completion provider.
#[derive(Clone)]
pub struct RelayService {
    provider: Arc<dyn CompletionProvider>,
}

impl RelayService {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Opens a completion stream for `prompt`.
    ///
    /// Waits for the first fragment so that a provider failure surfacing
    /// there is still reported as an `Err` rather than mid-body. An empty
    /// completion yields an empty stream.
    pub async fn open_stream(&self, prompt: &str) -> Result<FragmentStream, AppError> {
        debug!("Relaying prompt of {} bytes", prompt.len());
        let mut fragments = self.provider.stream_completion(prompt).await?;

        match fragments.next().await {
            Some(Ok(first)) => Ok(Box::pin(stream::iter([Ok(first)]).chain(fragments))),
            Some(Err(e)) => Err(e),
            None => Ok(Box::pin(stream::empty())),
        }
    }
}
