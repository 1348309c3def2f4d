use serde::{Deserialize, Serialize};

use crate::model::ids::{AudioRef, MessageId};

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Tutor,
}

/// Speech synthesis state of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioState {
    #[default]
    None,
    Pending,
    Ready(AudioRef),
    Failed,
}

/// One turn in a tutor conversation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    id: MessageId,
    text: String,
    role: ChatRole,
    audio: AudioState,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, text)
    }

    #[must_use]
    pub fn tutor(text: impl Into<String>) -> Self {
        Self::new(ChatRole::Tutor, text)
    }

    fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_random(),
            text: text.into(),
            role,
            audio: AudioState::None,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn role(&self) -> ChatRole {
        self.role
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }

    #[must_use]
    pub fn audio(&self) -> AudioState {
        self.audio
    }

    pub fn set_audio(&mut self, audio: AudioState) {
        self.audio = audio;
    }
}
