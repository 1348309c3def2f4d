use std::collections::HashMap;

use profe_core::model::{AudioRef, AudioState, ChatMessage, MessageId, ProficiencyLevel};

use crate::ai::AudioPayload;
use crate::error::TutorError;

/// Whether the tutor is waiting on a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TutorPhase {
    #[default]
    Idle,
    AwaitingReply,
}

/// State holder for one chat conversation.
#[derive(Debug, Clone)]
pub struct TutorSession {
    phase: TutorPhase,
    level: ProficiencyLevel,
    messages: Vec<ChatMessage>,
    audio: HashMap<AudioRef, AudioPayload>,
}

impl Default for TutorSession {
    fn default() -> Self {
        Self::new(ProficiencyLevel::lowest())
    }
}

impl TutorSession {
    #[must_use]
    pub fn new(level: ProficiencyLevel) -> Self {
        Self {
            phase: TutorPhase::Idle,
            level,
            messages: Vec::new(),
            audio: HashMap::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> TutorPhase {
        self.phase
    }

    #[must_use]
    pub fn level(&self) -> ProficiencyLevel {
        self.level
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id() == id)
    }

    #[must_use]
    pub fn audio(&self, audio: AudioRef) -> Option<&AudioPayload> {
        self.audio.get(&audio)
    }

    /// Return to `Idle` after an abandoned reply. The user message stays.
    pub fn cancel_pending(&mut self) {
        self.phase = TutorPhase::Idle;
    }

    /// Append the user's message and start waiting for a reply.
    pub(crate) fn begin_send(&mut self, text: &str) -> Result<MessageId, TutorError> {
        if self.phase == TutorPhase::AwaitingReply {
            return Err(TutorError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(TutorError::EmptyMessage);
        }
        let message = ChatMessage::user(text);
        let id = message.id();
        self.messages.push(message);
        self.phase = TutorPhase::AwaitingReply;
        Ok(id)
    }

    pub(crate) fn finish_reply(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::tutor(text));
        self.phase = TutorPhase::Idle;
        &self.messages[self.messages.len() - 1]
    }

    fn message_mut(&mut self, id: MessageId) -> Result<&mut ChatMessage, TutorError> {
        self.messages
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or(TutorError::UnknownMessage)
    }

    /// Mark a tutor message as waiting for audio and return its text.
    pub(crate) fn begin_audio(&mut self, id: MessageId) -> Result<String, TutorError> {
        let message = self.message_mut(id)?;
        if message.is_user() {
            return Err(TutorError::NotSpeakable);
        }
        message.set_audio(AudioState::Pending);
        Ok(message.text().to_owned())
    }

    pub(crate) fn finish_audio(
        &mut self,
        id: MessageId,
        outcome: Option<AudioPayload>,
    ) -> Result<AudioState, TutorError> {
        let state = match outcome {
            Some(payload) => {
                let audio = AudioRef::new_random();
                self.audio.insert(audio, payload);
                AudioState::Ready(audio)
            }
            None => AudioState::Failed,
        };
        self.message_mut(id)?.set_audio(state);
        Ok(state)
    }
}
