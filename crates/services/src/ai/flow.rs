use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::ai::client::{LlmClient, SpeechSynthesizer};
use crate::config::FlowConfig;
use crate::error::GenerationError;

/// Entry point for every prompt flow.
///
/// Holds the model clients and the shared flow settings. Each flow lives in its
/// own module under `ai::flows` as an `impl PromptFlows` block.
#[derive(Clone)]
pub struct PromptFlows {
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) speech: Arc<dyn SpeechSynthesizer>,
    pub(crate) config: FlowConfig,
}

impl PromptFlows {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        speech: Arc<dyn SpeechSynthesizer>,
        config: FlowConfig,
    ) -> Self {
        Self {
            llm,
            speech,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.config.language
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Run one flow body under the configured deadline.
    pub(crate) async fn run<T, F>(&self, flow: &'static str, body: F) -> Result<T, GenerationError>
    where
        F: Future<Output = Result<T, GenerationError>>,
    {
        let after = self.config.timeout;
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(after, body)
            .await
            .map_err(|_| GenerationError::Timeout { flow, after })
            .and_then(|res| res);

        match &outcome {
            Ok(_) => tracing::debug!(flow, elapsed_ms = started.elapsed().as_millis(), "flow completed"),
            Err(e) => tracing::warn!(flow, error = %e, "flow failed"),
        }
        outcome
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), GenerationError> {
    if value.trim().is_empty() {
        return Err(GenerationError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
