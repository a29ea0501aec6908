use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates classes with their sessions, content items, enrollments,
/// completion records, attendance and indexes.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS classes (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT,
                    cadence TEXT NOT NULL,
                    target_weekday TEXT,
                    start_date TEXT,
                    end_date TEXT,
                    duration_weeks INTEGER NOT NULL CHECK (duration_weeks > 0),
                    creation_key BLOB NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS class_sessions (
                    id INTEGER PRIMARY KEY,
                    class_id INTEGER NOT NULL,
                    session_date TEXT NOT NULL,
                    sequence_number INTEGER NOT NULL CHECK (sequence_number > 0),
                    topic TEXT,
                    notes TEXT,
                    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS content_items (
                    id INTEGER PRIMARY KEY,
                    class_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    week_number INTEGER CHECK (week_number IS NULL OR week_number > 0),
                    display_order INTEGER NOT NULL,
                    is_published INTEGER NOT NULL CHECK (is_published IN (0, 1)),
                    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS enrollments (
                    id INTEGER PRIMARY KEY,
                    class_id INTEGER NOT NULL,
                    member_id INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    completed_lessons INTEGER NOT NULL CHECK (completed_lessons >= 0),
                    progress_percentage REAL NOT NULL
                        CHECK (progress_percentage BETWEEN 0 AND 100),
                    attendance_rate REAL NOT NULL CHECK (attendance_rate BETWEEN 0 AND 100),
                    version INTEGER NOT NULL CHECK (version >= 0),
                    enrolled_at TEXT NOT NULL,
                    completed_at TEXT,
                    UNIQUE (class_id, member_id),
                    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS content_completions (
                    enrollment_id INTEGER NOT NULL,
                    content_id INTEGER NOT NULL,
                    is_completed INTEGER NOT NULL CHECK (is_completed IN (0, 1)),
                    started_at TEXT,
                    completed_at TEXT,
                    PRIMARY KEY (enrollment_id, content_id),
                    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE,
                    FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE,
                    CHECK ((is_completed = 1) = (completed_at IS NOT NULL))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attendance (
                    session_id INTEGER NOT NULL,
                    enrollment_id INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    PRIMARY KEY (session_id, enrollment_id),
                    FOREIGN KEY (session_id) REFERENCES class_sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_class_sessions_class_date
                    ON class_sessions(class_id, session_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_content_items_class_order
                    ON content_items(class_id, is_published, week_number, display_order, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attendance_enrollment
                    ON attendance(enrollment_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
