use disciple_core::model::{ContentCompletion, ContentId, Enrollment, EnrollmentId};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::enrollment_repo::update_enrollment;
use super::mapping::{conn, id_to_i64, map_completion_row, write_err};
use crate::repository::{CompletionRepository, ProgressPersistence, StorageError};

async fn fetch_completion(
    db: &mut SqliteConnection,
    enrollment: i64,
    content: i64,
) -> Result<Option<ContentCompletion>, StorageError> {
    let row = sqlx::query(
        r"
        SELECT enrollment_id, content_id, is_completed, started_at, completed_at
        FROM content_completions
        WHERE enrollment_id = ?1 AND content_id = ?2
        ",
    )
    .bind(enrollment)
    .bind(content)
    .fetch_optional(&mut *db)
    .await
    .map_err(conn)?;

    row.as_ref().map(map_completion_row).transpose()
}

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn completions_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<ContentCompletion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT enrollment_id, content_id, is_completed, started_at, completed_at
            FROM content_completions
            WHERE enrollment_id = ?1
            ORDER BY content_id ASC
            ",
        )
        .bind(id_to_i64("enrollment_id", enrollment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_completion_row(&row)?);
        }
        Ok(out)
    }

    async fn get_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
    ) -> Result<Option<ContentCompletion>, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        fetch_completion(
            &mut db,
            id_to_i64("enrollment_id", enrollment_id.value())?,
            id_to_i64("content_id", content_id.value())?,
        )
        .await
    }

    async fn start_completion(
        &self,
        record: &ContentCompletion,
    ) -> Result<ContentCompletion, StorageError> {
        let enrollment = id_to_i64("enrollment_id", record.enrollment_id().value())?;
        let content = id_to_i64("content_id", record.content_id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO content_completions (
                enrollment_id, content_id, is_completed, started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(enrollment_id, content_id) DO NOTHING
            ",
        )
        .bind(enrollment)
        .bind(content)
        .bind(i64::from(record.is_completed()))
        .bind(record.started_at())
        .bind(record.completed_at())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let stored = fetch_completion(&mut tx, enrollment, content)
            .await?
            .ok_or(StorageError::NotFound)?;
        tx.commit().await.map_err(conn)?;
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl ProgressPersistence for SqliteRepository {
    async fn apply_completion(
        &self,
        enrollment: &Enrollment,
        completion: &ContentCompletion,
    ) -> Result<u64, StorageError> {
        if completion.enrollment_id() != enrollment.id() {
            return Err(StorageError::Conflict);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // Claim the version first; a stale writer stops here and rolls back.
        let version = update_enrollment(&mut tx, enrollment).await?;

        sqlx::query(
            r"
            INSERT INTO content_completions (
                enrollment_id, content_id, is_completed, started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(enrollment_id, content_id) DO UPDATE SET
                -- keep started_at from the first interaction
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at,
                started_at = COALESCE(content_completions.started_at, excluded.started_at)
            ",
        )
        .bind(id_to_i64("enrollment_id", completion.enrollment_id().value())?)
        .bind(id_to_i64("content_id", completion.content_id().value())?)
        .bind(i64::from(completion.is_completed()))
        .bind(completion.started_at())
        .bind(completion.completed_at())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(conn)?;
        Ok(version)
    }
}
