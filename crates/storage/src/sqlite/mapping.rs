use chrono::Weekday;
use disciple_core::model::{
    AttendanceRecord, AttendanceStatus, Cadence, Class, ClassId, ClassSchedule, ClassSession,
    ContentCompletion, ContentId, ContentItem, CreationKey, Enrollment, EnrollmentId,
    EnrollmentProgress, EnrollmentStatus, MemberId, SessionId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps constraint violations on writes to domain-level storage errors.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    conn(e)
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn class_id_from_i64(v: i64) -> Result<ClassId, StorageError> {
    Ok(ClassId::new(i64_to_u64("class_id", v)?))
}

pub(crate) fn content_id_from_i64(v: i64) -> Result<ContentId, StorageError> {
    Ok(ContentId::new(i64_to_u64("content_id", v)?))
}

pub(crate) fn enrollment_id_from_i64(v: i64) -> Result<EnrollmentId, StorageError> {
    Ok(EnrollmentId::new(i64_to_u64("enrollment_id", v)?))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

fn parse_weekday(s: &str) -> Result<Weekday, StorageError> {
    s.parse::<Weekday>()
        .map_err(|_| StorageError::Serialization(format!("invalid weekday: {s}")))
}

pub(crate) fn weekday_to_str(day: Weekday) -> String {
    day.to_string()
}

pub(crate) fn map_class_row(row: &SqliteRow) -> Result<Class, StorageError> {
    let cadence: Cadence = row
        .try_get::<String, _>("cadence")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let weekday = row
        .try_get::<Option<String>, _>("target_weekday")
        .map_err(ser)?
        .as_deref()
        .map(parse_weekday)
        .transpose()?;

    let schedule = ClassSchedule::from_persisted(
        cadence,
        weekday,
        row.try_get("start_date").map_err(ser)?,
        row.try_get("end_date").map_err(ser)?,
        i64_to_u32(
            "duration_weeks",
            row.try_get::<i64, _>("duration_weeks").map_err(ser)?,
        )?,
    )
    .map_err(ser)?;

    let key: Uuid = row.try_get("creation_key").map_err(ser)?;

    Class::new(
        class_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        schedule,
        CreationKey::from_uuid(key),
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<ClassSession, StorageError> {
    Ok(ClassSession {
        id: session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        class_id: class_id_from_i64(row.try_get::<i64, _>("class_id").map_err(ser)?)?,
        session_date: row.try_get("session_date").map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        notes: row.try_get("notes").map_err(ser)?,
    })
}

pub(crate) fn map_content_row(row: &SqliteRow) -> Result<ContentItem, StorageError> {
    let week_number = row
        .try_get::<Option<i64>, _>("week_number")
        .map_err(ser)?
        .map(|w| i64_to_u32("week_number", w))
        .transpose()?;
    let order = i32::try_from(row.try_get::<i64, _>("display_order").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("display_order overflow".into()))?;

    ContentItem::new(
        content_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        class_id_from_i64(row.try_get::<i64, _>("class_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        week_number,
        order,
        row.try_get::<i64, _>("is_published").map_err(ser)? != 0,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: EnrollmentStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let progress = EnrollmentProgress::from_persisted(
        i64_to_u32(
            "completed_lessons",
            row.try_get::<i64, _>("completed_lessons").map_err(ser)?,
        )?,
        row.try_get("progress_percentage").map_err(ser)?,
    )
    .map_err(ser)?;

    Enrollment::from_persisted(
        enrollment_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        class_id_from_i64(row.try_get::<i64, _>("class_id").map_err(ser)?)?,
        MemberId::new(i64_to_u64(
            "member_id",
            row.try_get::<i64, _>("member_id").map_err(ser)?,
        )?),
        status,
        progress,
        row.try_get("attendance_rate").map_err(ser)?,
        i64_to_u64("version", row.try_get::<i64, _>("version").map_err(ser)?)?,
        row.try_get("enrolled_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<ContentCompletion, StorageError> {
    ContentCompletion::from_persisted(
        enrollment_id_from_i64(row.try_get::<i64, _>("enrollment_id").map_err(ser)?)?,
        content_id_from_i64(row.try_get::<i64, _>("content_id").map_err(ser)?)?,
        row.try_get::<i64, _>("is_completed").map_err(ser)? != 0,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attendance_row(row: &SqliteRow) -> Result<AttendanceRecord, StorageError> {
    let status: AttendanceStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Ok(AttendanceRecord::new(
        session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        enrollment_id_from_i64(row.try_get::<i64, _>("enrollment_id").map_err(ser)?)?,
        status,
        row.try_get("recorded_at").map_err(ser)?,
    ))
}
