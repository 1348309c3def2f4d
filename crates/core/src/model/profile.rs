use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ids::{ExerciseId, UserId};
use crate::model::level::ProficiencyLevel;

/// Identity fields used to create a profile the first time a user signs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSeed {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<Url>,
}

/// Per-user learning state: assessed level and completed exercises.
///
/// `completed_exercises` behaves as a set but keeps insertion order, which drives
/// exercise unlocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    uid: UserId,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<Url>,
    level: Option<ProficiencyLevel>,
    completed_exercises: Vec<ExerciseId>,
    created_at: DateTime<Utc>,
}

impl UserProfile {
    #[must_use]
    pub fn new(uid: UserId, seed: ProfileSeed, created_at: DateTime<Utc>) -> Self {
        Self {
            uid,
            email: seed.email,
            display_name: seed.display_name,
            photo_url: seed.photo_url,
            level: None,
            completed_exercises: Vec::new(),
            created_at,
        }
    }

    /// Rehydrate a profile from storage. Duplicate exercise ids are collapsed.
    #[must_use]
    pub fn from_persisted(
        uid: UserId,
        seed: ProfileSeed,
        level: Option<ProficiencyLevel>,
        completed_exercises: Vec<ExerciseId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut profile = Self::new(uid, seed, created_at);
        profile.level = level;
        for id in completed_exercises {
            profile.complete_exercise(id);
        }
        profile
    }

    #[must_use]
    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn photo_url(&self) -> Option<&Url> {
        self.photo_url.as_ref()
    }

    #[must_use]
    pub fn level(&self) -> Option<ProficiencyLevel> {
        self.level
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn completed_exercises(&self) -> &[ExerciseId] {
        &self.completed_exercises
    }

    #[must_use]
    pub fn has_completed(&self, id: &ExerciseId) -> bool {
        self.completed_exercises.contains(id)
    }

    /// Level used for prompts when the user has not taken the placement quiz.
    #[must_use]
    pub fn level_or_default(&self) -> ProficiencyLevel {
        self.level.unwrap_or_else(ProficiencyLevel::lowest)
    }

    pub fn set_level(&mut self, level: Option<ProficiencyLevel>) {
        self.level = level;
    }

    /// Add `id` to the completed set. Returns `false` when it was already present.
    pub fn complete_exercise(&mut self, id: ExerciseId) -> bool {
        if self.has_completed(&id) {
            return false;
        }
        self.completed_exercises.push(id);
        true
    }

    /// Undo a completion, used to roll back an optimistic update.
    pub fn forget_exercise(&mut self, id: &ExerciseId) -> bool {
        let before = self.completed_exercises.len();
        self.completed_exercises.retain(|existing| existing != id);
        before != self.completed_exercises.len()
    }
}
