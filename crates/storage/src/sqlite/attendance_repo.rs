use disciple_core::model::{AttendanceRecord, Enrollment, EnrollmentId};

use super::SqliteRepository;
use super::enrollment_repo::update_enrollment;
use super::mapping::{conn, id_to_i64, map_attendance_row, write_err};
use crate::repository::{AttendanceRepository, StorageError};

#[async_trait::async_trait]
impl AttendanceRepository for SqliteRepository {
    async fn apply_attendance(
        &self,
        enrollment: &Enrollment,
        record: &AttendanceRecord,
    ) -> Result<u64, StorageError> {
        if record.enrollment_id != enrollment.id() {
            return Err(StorageError::Conflict);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        let version = update_enrollment(&mut tx, enrollment).await?;

        sqlx::query(
            r"
            INSERT INTO attendance (session_id, enrollment_id, status, recorded_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id, enrollment_id) DO UPDATE SET
                status = excluded.status,
                recorded_at = excluded.recorded_at
            ",
        )
        .bind(id_to_i64("session_id", record.session_id.value())?)
        .bind(id_to_i64("enrollment_id", record.enrollment_id.value())?)
        .bind(record.status.as_str())
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(conn)?;
        Ok(version)
    }

    async fn attendance_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT session_id, enrollment_id, status, recorded_at
            FROM attendance
            WHERE enrollment_id = ?1
            ORDER BY session_id ASC
            ",
        )
        .bind(id_to_i64("enrollment_id", enrollment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attendance_row(&row)?);
        }
        Ok(out)
    }
}
