use chrono::{DateTime, Utc};
use profe_core::model::{
    ExerciseId, ProficiencyLevel, ProfileSeed, QuizHistoryEntry, UserId, UserProfile,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use url::Url;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn parse_level(raw: Option<String>) -> Result<Option<ProficiencyLevel>, StorageError> {
    raw.map(|s| s.parse::<ProficiencyLevel>().map_err(ser))
        .transpose()
}

pub(crate) fn parse_photo_url(raw: Option<String>) -> Result<Option<Url>, StorageError> {
    raw.map(|s| Url::parse(&s).map_err(ser)).transpose()
}

/// Build a profile from a `users` row and its ordered exercise ids.
pub(crate) fn map_profile_row(
    row: &SqliteRow,
    exercise_ids: Vec<String>,
) -> Result<UserProfile, StorageError> {
    let uid = UserId::new(row.try_get::<String, _>("uid").map_err(ser)?).map_err(ser)?;
    let seed = ProfileSeed {
        email: row.try_get("email").map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        photo_url: parse_photo_url(row.try_get("photo_url").map_err(ser)?)?,
    };
    let level = parse_level(row.try_get("level").map_err(ser)?)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    let completed = exercise_ids
        .into_iter()
        .map(|id| ExerciseId::new(id).map_err(ser))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UserProfile::from_persisted(
        uid, seed, level, completed, created_at,
    ))
}

pub(crate) fn map_history_row(row: &SqliteRow) -> Result<QuizHistoryEntry, StorageError> {
    let level = parse_level(Some(row.try_get::<String, _>("level").map_err(ser)?))?
        .ok_or_else(|| StorageError::Serialization("missing level".into()))?;
    Ok(QuizHistoryEntry {
        level,
        reasoning: row.try_get("reasoning").map_err(ser)?,
        responses: row.try_get("responses").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_known_values() {
        assert_eq!(
            parse_level(Some("B2".into())).unwrap(),
            Some(ProficiencyLevel::B2)
        );
        assert_eq!(parse_level(None).unwrap(), None);
        assert!(matches!(
            parse_level(Some("Z9".into())),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn parse_photo_url_rejects_garbage() {
        assert!(parse_photo_url(Some("not a url".into())).is_err());
        assert!(
            parse_photo_url(Some("https://example.com/a.png".into()))
                .unwrap()
                .is_some()
        );
    }
}
