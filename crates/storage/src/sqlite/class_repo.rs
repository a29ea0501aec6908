use disciple_core::model::{Class, ClassId, ClassSession, CreationKey, SessionPlanEntry};

use super::SqliteRepository;
use super::mapping::{
    class_id_from_i64, conn, id_to_i64, map_class_row, map_session_row, weekday_to_str, write_err,
};
use crate::repository::{ClassRepository, NewClassRecord, StorageError};

const CLASS_COLUMNS: &str = r"
    id, name, description, cadence, target_weekday, start_date, end_date,
    duration_weeks, creation_key, created_at
";

#[async_trait::async_trait]
impl ClassRepository for SqliteRepository {
    async fn insert_class_with_sessions(
        &self,
        class: NewClassRecord,
        plan: &[SessionPlanEntry],
    ) -> Result<ClassId, StorageError> {
        let schedule = &class.schedule;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO classes (
                name, description, cadence, target_weekday, start_date, end_date,
                duration_weeks, creation_key, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(&class.name)
        .bind(&class.description)
        .bind(schedule.cadence().as_str())
        .bind(schedule.target_weekday().map(weekday_to_str))
        .bind(schedule.start_date())
        .bind(schedule.explicit_end_date())
        .bind(i64::from(schedule.duration_weeks()))
        .bind(class.creation_key.as_uuid())
        .bind(class.created_at)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        let class_row_id = res.last_insert_rowid();

        for entry in plan {
            sqlx::query(
                r"
                INSERT INTO class_sessions (class_id, session_date, sequence_number, topic, notes)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(class_row_id)
            .bind(entry.session_date)
            .bind(i64::from(entry.sequence_number))
            .bind(&entry.topic)
            .bind(&entry.notes)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn)?;
        class_id_from_i64(class_row_id)
    }

    async fn find_by_creation_key(&self, key: CreationKey) -> Result<Option<Class>, StorageError> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE creation_key = ?1");
        let row = sqlx::query(&sql)
            .bind(key.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_class_row).transpose()
    }

    async fn get_class(&self, id: ClassId) -> Result<Option<Class>, StorageError> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_to_i64("class_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_class_row).transpose()
    }

    async fn list_sessions(&self, class_id: ClassId) -> Result<Vec<ClassSession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, class_id, session_date, topic, notes
            FROM class_sessions
            WHERE class_id = ?1
            ORDER BY session_date ASC, sequence_number ASC
            ",
        )
        .bind(id_to_i64("class_id", class_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }
}
