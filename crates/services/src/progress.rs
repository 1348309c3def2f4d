use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use profe_core::model::{
    ExerciseId, ProficiencyLevel, ProficiencyResult, ProfileSeed, QuizHistoryEntry, UserId,
    UserProfile,
};
use storage::repository::{ProfileRepository, QuizHistoryRepository, StorageError};

use crate::Clock;
use crate::error::StoreError;

type ProfileCache = Arc<RwLock<HashMap<UserId, UserProfile>>>;

/// Reads and writes a user's level, completed exercises and quiz history.
///
/// Mutations are applied to a local profile cache first and then persisted. A
/// failed write undoes only the field it changed in the cache.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    history: Arc<dyn QuizHistoryRepository>,
    cache: ProfileCache,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Storage(StorageError::Connection(e.to_string()))
}

fn missing(uid: &UserId) -> impl Fn(StorageError) -> StoreError + '_ {
    move |e| match e {
        StorageError::NotFound => StoreError::ProfileNotFound(uid.to_string()),
        other => StoreError::Storage(other),
    }
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        history: Arc<dyn QuizHistoryRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            history,
            cache: Arc::default(),
        }
    }

    /// The locally cached profile, if one was loaded.
    #[must_use]
    pub fn cached(&self, uid: &UserId) -> Option<UserProfile> {
        self.cache.read().ok()?.get(uid).cloned()
    }

    /// Drop the cached profile, e.g. on sign-out.
    pub fn evict(&self, uid: &UserId) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(uid);
        }
    }

    fn remember(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        cache.insert(profile.uid().clone(), profile.clone());
        Ok(())
    }

    /// Apply `change` to the cached profile, if one is cached.
    fn update_cached<R>(
        &self,
        uid: &UserId,
        change: impl FnOnce(&mut UserProfile) -> R,
    ) -> Result<Option<R>, StoreError> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        Ok(cache.get_mut(uid).map(change))
    }

    /// Undo one field of a failed optimistic update. Other fields keep whatever
    /// concurrent writers put there.
    fn revert(&self, uid: &UserId, undo: impl FnOnce(&mut UserProfile)) {
        if let Ok(mut cache) = self.cache.write() {
            if let Some(profile) = cache.get_mut(uid) {
                undo(profile);
            }
        }
    }

    /// Fetch the stored profile and refresh the cache.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ProfileNotFound` when no profile exists, or
    /// `StoreError::Storage` on backend failures.
    pub async fn load_profile(&self, uid: &UserId) -> Result<UserProfile, StoreError> {
        let profile = self
            .profiles
            .get_profile(uid)
            .await?
            .ok_or_else(|| StoreError::ProfileNotFound(uid.to_string()))?;
        self.remember(&profile)?;
        Ok(profile)
    }

    /// Cached profile, loading it from storage on a miss.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::load_profile`].
    pub async fn profile(&self, uid: &UserId) -> Result<UserProfile, StoreError> {
        match self.cached(uid) {
            Some(profile) => Ok(profile),
            None => self.load_profile(uid).await,
        }
    }

    /// Create the user's profile unless one already exists.
    ///
    /// Returns `true` when a new profile was written. Either way the stored
    /// profile ends up in the cache.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn create_profile_if_absent(
        &self,
        uid: &UserId,
        seed: ProfileSeed,
    ) -> Result<bool, StoreError> {
        let profile = UserProfile::new(uid.clone(), seed, self.clock.now());
        let created = self.profiles.insert_profile_if_absent(&profile).await?;
        if created {
            tracing::info!(uid = %uid, "created user profile");
            self.remember(&profile)?;
        } else {
            self.load_profile(uid).await?;
        }
        Ok(created)
    }

    /// Overwrite the user's assessed level.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ProfileNotFound` for an unknown user. The cached level
    /// is restored if the write fails.
    pub async fn set_level(&self, uid: &UserId, level: ProficiencyLevel) -> Result<(), StoreError> {
        let previous = self.update_cached(uid, |profile| {
            let previous = profile.level();
            profile.set_level(Some(level));
            previous
        })?;

        if let Err(e) = self.profiles.set_level(uid, Some(level)).await {
            if let Some(previous) = previous {
                self.revert(uid, |profile| {
                    if profile.level() == Some(level) {
                        profile.set_level(previous);
                    }
                });
            }
            tracing::warn!(uid = %uid, error = %e, "level write failed, cache rolled back");
            return Err(missing(uid)(e));
        }
        Ok(())
    }

    /// Add `exercise` to the user's completed set.
    ///
    /// Returns `false` without writing when the exercise was already completed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ProfileNotFound` for an unknown user. The cached set is
    /// restored if the write fails.
    pub async fn mark_exercise_complete(
        &self,
        uid: &UserId,
        exercise: &ExerciseId,
    ) -> Result<bool, StoreError> {
        if self.profile(uid).await?.has_completed(exercise) {
            return Ok(false);
        }

        let added =
            self.update_cached(uid, |profile| profile.complete_exercise(exercise.clone()))?;

        match self.profiles.add_completed_exercise(uid, exercise).await {
            Ok(_) => {
                tracing::info!(uid = %uid, exercise = %exercise, "exercise completed");
                Ok(true)
            }
            Err(e) => {
                if added == Some(true) {
                    self.revert(uid, |profile| {
                        profile.forget_exercise(exercise);
                    });
                }
                tracing::warn!(uid = %uid, error = %e, "exercise write failed, cache rolled back");
                Err(missing(uid)(e))
            }
        }
    }

    /// Adopt a finished quiz's level and store it in the user's history.
    ///
    /// The level is written first. A failed history write leaves the new level
    /// in place, so calling again with the same result completes the record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either write fails.
    pub async fn record_quiz_result(
        &self,
        uid: &UserId,
        result: &ProficiencyResult,
        responses: &str,
    ) -> Result<QuizHistoryEntry, StoreError> {
        self.set_level(uid, result.level()).await?;
        let entry = QuizHistoryEntry::new(result, responses, self.clock.now());
        self.history
            .append_history(uid, &entry)
            .await
            .map_err(missing(uid))?;
        tracing::info!(uid = %uid, level = %result.level(), "quiz result recorded");
        Ok(entry)
    }

    /// Most recent quiz results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on backend failures.
    pub async fn quiz_history(
        &self,
        uid: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizHistoryEntry>, StoreError> {
        Ok(self.history.list_history(uid, limit).await?)
    }
}
