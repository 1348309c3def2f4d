use profe_core::model::{ExerciseId, ProficiencyLevel, UserId, UserProfile};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row, ser};
use crate::repository::{ProfileRepository, StorageError};

async fn user_exists<'e, E>(executor: E, uid: &UserId) -> Result<bool, StorageError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query("SELECT 1 FROM users WHERE uid = ?1")
        .bind(uid.as_str())
        .fetch_optional(executor)
        .await
        .map_err(conn)?;
    Ok(row.is_some())
}

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT uid, email, display_name, photo_url, level, created_at
            FROM users WHERE uid = ?1
            ",
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let exercise_rows = sqlx::query(
            r"
            SELECT exercise_id FROM user_completed_exercises
            WHERE uid = ?1
            ORDER BY position ASC
            ",
        )
        .bind(uid.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut exercise_ids = Vec::with_capacity(exercise_rows.len());
        for r in exercise_rows {
            exercise_ids.push(r.try_get::<String, _>("exercise_id").map_err(ser)?);
        }

        map_profile_row(&row, exercise_ids).map(Some)
    }

    async fn insert_profile_if_absent(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO users (uid, email, display_name, photo_url, level, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(uid) DO NOTHING
            ",
        )
        .bind(profile.uid().as_str())
        .bind(profile.email())
        .bind(profile.display_name())
        .bind(profile.photo_url().map(url::Url::as_str))
        .bind(profile.level().map(ProficiencyLevel::as_str))
        .bind(profile.created_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(conn)?;
            return Ok(false);
        }

        for (position, exercise) in profile.completed_exercises().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO user_completed_exercises (uid, exercise_id, position)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(profile.uid().as_str())
            .bind(exercise.as_str())
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(true)
    }

    async fn set_level(
        &self,
        uid: &UserId,
        level: Option<ProficiencyLevel>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE users SET level = ?2 WHERE uid = ?1")
            .bind(uid.as_str())
            .bind(level.map(ProficiencyLevel::as_str))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn add_completed_exercise(
        &self,
        uid: &UserId,
        exercise: &ExerciseId,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        if !user_exists(&mut *tx, uid).await? {
            tx.rollback().await.map_err(conn)?;
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
            INSERT INTO user_completed_exercises (uid, exercise_id, position)
            VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM user_completed_exercises WHERE uid = ?1)
            )
            ON CONFLICT(uid, exercise_id) DO NOTHING
            ",
        )
        .bind(uid.as_str())
        .bind(exercise.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(res.rows_affected() == 1)
    }
}
