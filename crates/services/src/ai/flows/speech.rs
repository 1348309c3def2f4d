use crate::ai::client::AudioPayload;
use crate::ai::flow::{PromptFlows, require_text};
use crate::error::GenerationError;

const FLOW: &str = "text-to-speech";

/// Input of the text-to-speech flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
}

impl SpeechRequest {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

impl PromptFlows {
    /// Render text as speech audio.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for blank text, synthesizer failures or an empty
    /// audio payload.
    pub async fn synthesize_speech(
        &self,
        request: &SpeechRequest,
    ) -> Result<AudioPayload, GenerationError> {
        require_text("text", &request.text)?;

        self.run(FLOW, async {
            let payload = self
                .speech
                .synthesize(request.text.trim(), request.voice.as_deref())
                .await?;
            if payload.data.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            tracing::debug!(flow = FLOW, bytes = payload.data.len(), mime = %payload.mime_type, "speech ready");
            Ok(payload)
        })
        .await
    }
}
