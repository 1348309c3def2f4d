use profe_core::model::{AudioRef, AudioState, ChatMessage, MessageId};

use super::session::TutorSession;
use crate::ai::{FeedbackRequest, FeedbackResult, PromptFlows, SpeechRequest};
use crate::error::{GenerationError, TutorError};

/// Drives a [`TutorSession`] through the conversation and speech flows.
#[derive(Clone)]
pub struct TutorService {
    flows: PromptFlows,
    voice: Option<String>,
}

impl TutorService {
    #[must_use]
    pub fn new(flows: PromptFlows) -> Self {
        Self { flows, voice: None }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Send a learner message and wait for the tutor's reply.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::Busy` while a reply is pending, `TutorError::EmptyMessage`
    /// for blank text, or `TutorError::Generation` if the flow fails. On failure
    /// the learner's message stays in the conversation and the session is idle.
    pub async fn send(
        &self,
        session: &mut TutorSession,
        text: &str,
    ) -> Result<ChatMessage, TutorError> {
        session.begin_send(text)?;

        let request = FeedbackRequest::Conversation {
            message: text.trim().to_owned(),
            level: session.level(),
        };
        let reply = match self.flows.provide_feedback(&request).await {
            Ok(FeedbackResult::ConversationalReply { text }) => text,
            Ok(FeedbackResult::GrammarFeedback { .. }) => {
                session.cancel_pending();
                return Err(GenerationError::InvalidReply(
                    "expected a conversational reply".into(),
                )
                .into());
            }
            Err(e) => {
                session.cancel_pending();
                return Err(e.into());
            }
        };

        Ok(session.finish_reply(reply).clone())
    }

    /// Synthesize audio for a tutor message and attach it to the session.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::UnknownMessage` / `TutorError::NotSpeakable` for a bad
    /// id, or `TutorError::Generation` when synthesis fails (the message is then
    /// marked `AudioState::Failed`).
    pub async fn speak(
        &self,
        session: &mut TutorSession,
        id: MessageId,
    ) -> Result<AudioRef, TutorError> {
        let text = session.begin_audio(id)?;

        let mut request = SpeechRequest::new(text);
        request.voice.clone_from(&self.voice);

        match self.flows.synthesize_speech(&request).await {
            Ok(payload) => match session.finish_audio(id, Some(payload))? {
                AudioState::Ready(audio) => Ok(audio),
                _ => Err(TutorError::UnknownMessage),
            },
            Err(e) => {
                session.finish_audio(id, None)?;
                Err(e.into())
            }
        }
    }
}
