use async_trait::async_trait;
use profe_core::model::{ExerciseId, ProficiencyLevel, QuizHistoryEntry, UserId, UserProfile};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for user profile documents.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing profile is `Ok(None)`.
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError>;

    /// Store `profile` unless a profile with the same uid exists.
    ///
    /// Returns `true` when the profile was created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<bool, StorageError>;

    /// Overwrite the assessed level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile is missing.
    async fn set_level(
        &self,
        uid: &UserId,
        level: Option<ProficiencyLevel>,
    ) -> Result<(), StorageError>;

    /// Add an exercise id to the completed set (array-union semantics).
    ///
    /// Returns `true` when the id was not already present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the profile is missing.
    async fn add_completed_exercise(
        &self,
        uid: &UserId,
        exercise: &ExerciseId,
    ) -> Result<bool, StorageError>;
}

/// Repository contract for per-user quiz history, keyed by completion time.
#[async_trait]
pub trait QuizHistoryRepository: Send + Sync {
    /// Append a history entry and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_history(
        &self,
        uid: &UserId,
        entry: &QuizHistoryEntry,
    ) -> Result<i64, StorageError>;

    /// List the most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_history(
        &self,
        uid: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizHistoryEntry>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    profiles: Arc<Mutex<HashMap<UserId, UserProfile>>>,
    history: Arc<Mutex<HashMap<UserId, Vec<(i64, QuizHistoryEntry)>>>>,
    next_history_id: Arc<Mutex<i64>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        Ok(guard.get(uid).cloned())
    }

    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        if guard.contains_key(profile.uid()) {
            return Ok(false);
        }
        guard.insert(profile.uid().clone(), profile.clone());
        Ok(true)
    }

    async fn set_level(
        &self,
        uid: &UserId,
        level: Option<ProficiencyLevel>,
    ) -> Result<(), StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let profile = guard.get_mut(uid).ok_or(StorageError::NotFound)?;
        profile.set_level(level);
        Ok(())
    }

    async fn add_completed_exercise(
        &self,
        uid: &UserId,
        exercise: &ExerciseId,
    ) -> Result<bool, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let profile = guard.get_mut(uid).ok_or(StorageError::NotFound)?;
        Ok(profile.complete_exercise(exercise.clone()))
    }
}

#[async_trait]
impl QuizHistoryRepository for InMemoryRepository {
    async fn append_history(
        &self,
        uid: &UserId,
        entry: &QuizHistoryEntry,
    ) -> Result<i64, StorageError> {
        if !self.profiles.lock().map_err(poisoned)?.contains_key(uid) {
            return Err(StorageError::NotFound);
        }
        let id = {
            let mut next = self.next_history_id.lock().map_err(poisoned)?;
            *next += 1;
            *next
        };
        let mut guard = self.history.lock().map_err(poisoned)?;
        guard
            .entry(uid.clone())
            .or_default()
            .push((id, entry.clone()));
        Ok(id)
    }

    async fn list_history(
        &self,
        uid: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizHistoryEntry>, StorageError> {
        let guard = self.history.lock().map_err(poisoned)?;
        let mut entries: Vec<(i64, QuizHistoryEntry)> =
            guard.get(uid).cloned().unwrap_or_default();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            b.completed_at.cmp(&a.completed_at).then(b_id.cmp(a_id))
        });
        Ok(entries
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, entry)| entry)
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub history: Arc<dyn QuizHistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo.clone());
        let history: Arc<dyn QuizHistoryRepository> = Arc::new(repo);
        Self { profiles, history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use profe_core::model::{ProficiencyResult, ProfileSeed};
    use profe_core::time::fixed_now;

    fn build_profile(uid: &str) -> UserProfile {
        UserProfile::new(
            UserId::new(uid).unwrap(),
            ProfileSeed {
                email: Some(format!("{uid}@example.com")),
                display_name: None,
                photo_url: None,
            },
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_existing_document() {
        let repo = InMemoryRepository::new();
        let profile = build_profile("u1");
        assert!(repo.insert_profile_if_absent(&profile).await.unwrap());

        repo.set_level(profile.uid(), Some(ProficiencyLevel::B2))
            .await
            .unwrap();
        assert!(!repo.insert_profile_if_absent(&profile).await.unwrap());

        let stored = repo.get_profile(profile.uid()).await.unwrap().unwrap();
        assert_eq!(stored.level(), Some(ProficiencyLevel::B2));
    }

    #[tokio::test]
    async fn add_completed_exercise_is_a_set_union() {
        let repo = InMemoryRepository::new();
        let profile = build_profile("u1");
        repo.insert_profile_if_absent(&profile).await.unwrap();
        let id = ExerciseId::new("greetings").unwrap();

        assert!(repo.add_completed_exercise(profile.uid(), &id).await.unwrap());
        assert!(!repo.add_completed_exercise(profile.uid(), &id).await.unwrap());

        let stored = repo.get_profile(profile.uid()).await.unwrap().unwrap();
        assert_eq!(stored.completed_exercises(), &[id]);
    }

    #[tokio::test]
    async fn writes_to_missing_profile_are_not_found() {
        let repo = InMemoryRepository::new();
        let uid = UserId::new("ghost").unwrap();
        let err = repo
            .set_level(&uid, Some(ProficiencyLevel::A1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let result = ProficiencyResult::new(ProficiencyLevel::A1, "razonamiento").unwrap();
        let entry = QuizHistoryEntry::new(&result, "Q: x\nA: y", fixed_now());
        assert!(matches!(
            repo.append_history(&uid, &entry).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn history_lists_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        let profile = build_profile("u1");
        repo.insert_profile_if_absent(&profile).await.unwrap();
        let uid = profile.uid().clone();
        for (offset, level) in [(0, ProficiencyLevel::A2), (1, ProficiencyLevel::B1), (2, ProficiencyLevel::B2)] {
            let result = ProficiencyResult::new(level, "razonamiento").unwrap();
            let entry =
                QuizHistoryEntry::new(&result, "Q: x\nA: y", fixed_now() + Duration::hours(offset));
            repo.append_history(&uid, &entry).await.unwrap();
        }

        let entries = repo.list_history(&uid, 2).await.unwrap();
        let levels: Vec<_> = entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![ProficiencyLevel::B2, ProficiencyLevel::B1]);
    }
}
