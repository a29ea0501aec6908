use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use disciple_core::model::{
    AttendanceRecord, AttendanceStatus, Cadence, ClassSchedule, Enrollment, EnrollmentError,
    EnrollmentId, MemberId, SessionId,
};
use disciple_core::time::fixed_now;
use services::{
    AppServices, AttendanceService, AttendanceServiceError, ClassDraft, Clock, CreatedClass,
};
use storage::repository::{AttendanceRepository, Storage, StorageError};

// The fixed clock reads 2023-11-14; the class meets on Tuesdays from 2023-10-31.
async fn weekly_class(app: &AppServices) -> CreatedClass {
    let start = NaiveDate::from_ymd_opt(2023, 10, 31).unwrap();
    let schedule = ClassSchedule::new(Cadence::Weekly, Some(start), 4)
        .unwrap()
        .with_target_weekday(Weekday::Tue);
    app.classes()
        .create_class(ClassDraft::new("Prayer", schedule))
        .await
        .unwrap()
}

#[tokio::test]
async fn rate_counts_held_sessions_and_skips_excused() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let class = weekly_class(&app).await;
    assert_eq!(class.sessions.len(), 4);

    let enrollment = app
        .enrollments()
        .enroll(class.class.id(), MemberId::new(3))
        .await
        .unwrap();
    app.enrollments().approve(enrollment.id()).await.unwrap();

    let attendance = app.attendance();
    let sessions: Vec<SessionId> = class.sessions.iter().map(|s| s.id).collect();

    let summary = attendance
        .record(enrollment.id(), sessions[0], AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(summary.held_sessions, 3);
    // Two held sessions have no record and count as absences.
    assert_eq!(summary.rate, 33.33);

    attendance
        .record(enrollment.id(), sessions[1], AttendanceStatus::Excused)
        .await
        .unwrap();
    let summary = attendance
        .record(enrollment.id(), sessions[3], AttendanceStatus::Absent)
        .await
        .unwrap();
    assert_eq!(summary.rate, 50.0);

    let stored = app.enrollments().get(enrollment.id()).await.unwrap();
    assert_eq!(stored.attendance_rate(), 50.0);
    assert_eq!(stored.progress().progress_percentage(), 0.0);

    // Correcting a record replaces it.
    let summary = attendance
        .record(enrollment.id(), sessions[2], AttendanceStatus::Present)
        .await
        .unwrap();
    assert_eq!(summary.rate, 100.0);
    assert_eq!(attendance.summary(enrollment.id()).await.unwrap(), summary);
}

#[tokio::test]
async fn attendance_needs_an_approved_enrollment_in_the_same_class() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let class = weekly_class(&app).await;
    let other = weekly_class(&app).await;

    let enrollment = app
        .enrollments()
        .enroll(class.class.id(), MemberId::new(3))
        .await
        .unwrap();

    let err = app
        .attendance()
        .record(enrollment.id(), class.sessions[0].id, AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AttendanceServiceError::Enrollment(EnrollmentError::NotActive { .. })
    ));

    app.enrollments().approve(enrollment.id()).await.unwrap();
    let err = app
        .attendance()
        .record(enrollment.id(), other.sessions[0].id, AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceServiceError::UnknownSession(_)));
}

/// Reads from the real store but always loses the optimistic-lock race.
struct StaleAttendance {
    inner: Arc<dyn AttendanceRepository>,
}

#[async_trait]
impl AttendanceRepository for StaleAttendance {
    async fn apply_attendance(
        &self,
        _enrollment: &Enrollment,
        _record: &AttendanceRecord,
    ) -> Result<u64, StorageError> {
        Err(StorageError::Conflict)
    }

    async fn attendance_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        self.inner.attendance_for(enrollment_id).await
    }
}

#[tokio::test]
async fn lost_race_leaves_no_record_and_no_rate() {
    let storage = Storage::in_memory();
    let app = AppServices::from_storage(&storage, Clock::fixed(fixed_now()));
    let class = weekly_class(&app).await;
    let enrollment = app
        .enrollments()
        .enroll(class.class.id(), MemberId::new(3))
        .await
        .unwrap();
    app.enrollments().approve(enrollment.id()).await.unwrap();

    let attendance = AttendanceService::new(
        Clock::fixed(fixed_now()),
        Arc::clone(&storage.classes),
        Arc::clone(&storage.enrollments),
        Arc::new(StaleAttendance {
            inner: Arc::clone(&storage.attendance),
        }),
    );
    let err = attendance
        .record(enrollment.id(), class.sessions[0].id, AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceServiceError::ConcurrencyConflict));

    assert!(
        storage
            .attendance
            .attendance_for(enrollment.id())
            .await
            .unwrap()
            .is_empty()
    );
    let stored = app.enrollments().get(enrollment.id()).await.unwrap();
    assert_eq!(stored.attendance_rate(), 0.0);
}

#[tokio::test]
async fn stale_enrollment_snapshot_cannot_record_attendance() {
    let storage = Storage::in_memory();
    let app = AppServices::from_storage(&storage, Clock::fixed(fixed_now()));
    let class = weekly_class(&app).await;
    let enrollment = app
        .enrollments()
        .enroll(class.class.id(), MemberId::new(3))
        .await
        .unwrap();
    let snapshot = app.enrollments().approve(enrollment.id()).await.unwrap();

    app.attendance()
        .record(snapshot.id(), class.sessions[0].id, AttendanceStatus::Present)
        .await
        .unwrap();

    let record = AttendanceRecord::new(
        class.sessions[1].id,
        snapshot.id(),
        AttendanceStatus::Absent,
        fixed_now(),
    );
    let err = storage
        .attendance
        .apply_attendance(&snapshot, &record)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert_eq!(
        storage.attendance.attendance_for(snapshot.id()).await.unwrap().len(),
        1
    );
}
