use disciple_core::model::{ClassId, Enrollment, EnrollmentId};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{conn, enrollment_id_from_i64, id_to_i64, map_enrollment_row, write_err};
use crate::repository::{EnrollmentRepository, NewEnrollmentRecord, StorageError};

const ENROLLMENT_COLUMNS: &str = r"
    id, class_id, member_id, status, completed_lessons, progress_percentage,
    attendance_rate, version, enrolled_at, completed_at
";

/// Version-guarded update shared by plain saves and completion writes.
pub(super) async fn update_enrollment(
    db: &mut SqliteConnection,
    enrollment: &Enrollment,
) -> Result<u64, StorageError> {
    let id = id_to_i64("enrollment_id", enrollment.id().value())?;
    let expected = id_to_i64("version", enrollment.version())?;
    let progress = enrollment.progress();

    let res = sqlx::query(
        r"
        UPDATE enrollments SET
            status = ?1,
            completed_lessons = ?2,
            progress_percentage = ?3,
            attendance_rate = ?4,
            completed_at = ?5,
            version = version + 1
        WHERE id = ?6 AND version = ?7
        ",
    )
    .bind(enrollment.status().as_str())
    .bind(i64::from(progress.completed_lessons()))
    .bind(progress.progress_percentage())
    .bind(enrollment.attendance_rate())
    .bind(enrollment.completed_at())
    .bind(id)
    .bind(expected)
    .execute(&mut *db)
    .await
    .map_err(write_err)?;

    if res.rows_affected() == 0 {
        let exists = sqlx::query("SELECT 1 FROM enrollments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *db)
            .await
            .map_err(conn)?;
        return Err(if exists.is_some() {
            StorageError::Conflict
        } else {
            StorageError::NotFound
        });
    }

    Ok(enrollment.version() + 1)
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollmentRecord,
    ) -> Result<EnrollmentId, StorageError> {
        let fresh = Enrollment::new(
            EnrollmentId::new(0),
            enrollment.class_id,
            enrollment.member_id,
            enrollment.enrolled_at,
        );

        let res = sqlx::query(
            r"
            INSERT INTO enrollments (
                class_id, member_id, status, completed_lessons, progress_percentage,
                attendance_rate, version, enrolled_at, completed_at
            )
            VALUES (?1, ?2, ?3, 0, 0.0, 0.0, 0, ?4, NULL)
            ",
        )
        .bind(id_to_i64("class_id", enrollment.class_id.value())?)
        .bind(id_to_i64("member_id", enrollment.member_id.value())?)
        .bind(fresh.status().as_str())
        .bind(enrollment.enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        enrollment_id_from_i64(res.last_insert_rowid())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("enrollment_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn list_enrollments(&self, class_id: ClassId) -> Result<Vec<Enrollment>, StorageError> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE class_id = ?1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("class_id", class_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_enrollment_row(&row)?);
        }
        Ok(out)
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<u64, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        update_enrollment(&mut db, enrollment).await
    }
}
