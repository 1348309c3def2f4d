use profe_core::model::{QuizHistoryEntry, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_history_row};
use crate::repository::{QuizHistoryRepository, StorageError};

#[async_trait::async_trait]
impl QuizHistoryRepository for SqliteRepository {
    async fn append_history(
        &self,
        uid: &UserId,
        entry: &QuizHistoryEntry,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO quiz_history (uid, level, reasoning, responses, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(uid.as_str())
        .bind(entry.level.as_str())
        .bind(&entry.reasoning)
        .bind(&entry.responses)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_foreign_key_violation() {
                    return StorageError::NotFound;
                }
            }
            conn(e)
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn list_history(
        &self,
        uid: &UserId,
        limit: u32,
    ) -> Result<Vec<QuizHistoryEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT level, reasoning, responses, completed_at
            FROM quiz_history
            WHERE uid = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(uid.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(map_history_row(&row)?);
        }
        Ok(entries)
    }
}
