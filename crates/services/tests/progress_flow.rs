use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use disciple_core::model::{
    Cadence, ClassSchedule, ContentCompletion, ContentId, Enrollment, EnrollmentError,
    EnrollmentId, EnrollmentStatus, MemberId,
};
use disciple_core::time::fixed_now;
use services::{AppServices, ClassDraft, Clock, ProgressError, ProgressEvent, ProgressService};
use storage::repository::{CompletionRepository, ProgressPersistence, Storage, StorageError};

struct Fixture {
    app: AppServices,
    storage: Storage,
    enrollment: EnrollmentId,
    lessons: Vec<ContentId>,
}

async fn fixture(lesson_count: usize) -> Fixture {
    let storage = Storage::in_memory();
    let app = AppServices::from_storage(&storage, Clock::fixed(fixed_now()));

    let start = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
    let schedule = ClassSchedule::new(Cadence::Weekly, Some(start), 6).unwrap();
    let class = app
        .classes()
        .create_class(ClassDraft::new("Foundations", schedule))
        .await
        .unwrap()
        .class;

    let mut lessons = Vec::new();
    for n in 0..lesson_count {
        let week = u32::try_from(n / 2 + 1).unwrap();
        let order = i32::try_from(n % 2).unwrap();
        let item = app
            .content()
            .add_content(class.id(), format!("Lesson {}", n + 1), Some(week), order, true)
            .await
            .unwrap();
        lessons.push(item.id());
    }

    let enrollment = app
        .enrollments()
        .enroll(class.id(), MemberId::new(1))
        .await
        .unwrap();
    app.enrollments().approve(enrollment.id()).await.unwrap();

    Fixture {
        app,
        storage,
        enrollment: enrollment.id(),
        lessons,
    }
}

fn lock_pattern(overview: &services::ContentOverview) -> Vec<(bool, bool)> {
    overview
        .items
        .iter()
        .map(|v| (v.state.completed, v.state.locked))
        .collect()
}

#[tokio::test]
async fn fresh_enrollment_sees_only_first_lesson_unlocked() {
    let f = fixture(5).await;
    let overview = f.app.progress().content_overview(f.enrollment).await.unwrap();

    assert_eq!(
        lock_pattern(&overview),
        vec![
            (false, false),
            (false, true),
            (false, true),
            (false, true),
            (false, true)
        ]
    );
    assert_eq!(overview.next_lesson, Some(f.lessons[0]));
    assert_eq!(overview.progress.progress_percentage(), 0.0);
}

#[tokio::test]
async fn completing_in_order_finishes_the_course() {
    let f = fixture(3).await;
    let progress = f.app.progress();

    let first = progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();
    assert_eq!(first.progress.completed_lessons(), 1);
    assert_eq!(first.progress.progress_percentage(), 33.33);
    assert_eq!(
        first.events,
        vec![ProgressEvent::LessonCompleted {
            enrollment: f.enrollment,
            content: f.lessons[0],
        }]
    );

    progress
        .set_completion(f.enrollment, f.lessons[1], true)
        .await
        .unwrap();
    let last = progress
        .set_completion(f.enrollment, f.lessons[2], true)
        .await
        .unwrap();

    assert_eq!(last.progress.progress_percentage(), 100.0);
    assert_eq!(last.status, EnrollmentStatus::Completed);
    assert!(last.events.contains(&ProgressEvent::CourseCompleted {
        enrollment: f.enrollment
    }));

    let stored = f.app.enrollments().get(f.enrollment).await.unwrap();
    assert_eq!(stored.status(), EnrollmentStatus::Completed);
    assert_eq!(stored.completed_at(), Some(fixed_now()));
    assert_eq!(stored.version(), last.version);

    // Un-completing a lesson reopens the enrollment.
    let reopened = progress
        .set_completion(f.enrollment, f.lessons[1], false)
        .await
        .unwrap();
    assert_eq!(reopened.status, EnrollmentStatus::Active);
    assert_eq!(reopened.progress.completed_lessons(), 2);
    assert_eq!(
        reopened.events,
        vec![ProgressEvent::LessonReopened {
            enrollment: f.enrollment,
            content: f.lessons[1],
        }]
    );
}

#[tokio::test]
async fn locked_lesson_is_rejected_but_staff_can_override() {
    let f = fixture(4).await;
    let progress = f.app.progress();

    let err = progress
        .set_completion(f.enrollment, f.lessons[2], true)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::ContentLocked(id) if id == f.lessons[2]));
    assert!(!err.is_retryable());

    let err = progress
        .open_content(f.enrollment, f.lessons[2])
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::ContentLocked(_)));

    progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();
    progress
        .override_completion(f.enrollment, f.lessons[2], true)
        .await
        .unwrap();

    let overview = progress.content_overview(f.enrollment).await.unwrap();
    assert_eq!(
        lock_pattern(&overview),
        vec![(true, false), (false, false), (true, false), (false, true)]
    );
    assert_eq!(overview.progress.completed_lessons(), 2);
    assert_eq!(overview.progress.progress_percentage(), 50.0);
}

#[tokio::test]
async fn overview_reflects_lessons_added_after_completion() {
    let f = fixture(2).await;
    let progress = f.app.progress();
    progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();
    progress
        .set_completion(f.enrollment, f.lessons[1], true)
        .await
        .unwrap();

    let class_id = f.app.enrollments().get(f.enrollment).await.unwrap().class_id();
    let added = f
        .app
        .content()
        .add_content(class_id, "Lesson 3", Some(2), 1, true)
        .await
        .unwrap();

    let overview = progress.content_overview(f.enrollment).await.unwrap();
    assert_eq!(
        lock_pattern(&overview),
        vec![(true, false), (true, false), (false, false)]
    );
    assert_eq!(overview.progress.completed_lessons(), 2);
    assert_eq!(overview.progress.progress_percentage(), 66.67);
    assert_eq!(overview.status, EnrollmentStatus::Active);
    assert_eq!(overview.next_lesson, Some(added.id()));

    // The stored projection is only refreshed by a write.
    let stored = f.app.enrollments().get(f.enrollment).await.unwrap();
    assert_eq!(stored.status(), EnrollmentStatus::Completed);

    let recalculated = progress.recalculate_metrics(f.enrollment).await.unwrap();
    assert_eq!(recalculated, overview.progress);
    let stored = f.app.enrollments().get(f.enrollment).await.unwrap();
    assert_eq!(stored.status(), EnrollmentStatus::Active);
    assert_eq!(stored.progress(), overview.progress);
}

#[tokio::test]
async fn toggling_twice_restores_progress() {
    let f = fixture(3).await;
    let progress = f.app.progress();
    progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();
    let before = progress.content_overview(f.enrollment).await.unwrap().progress;

    progress
        .set_completion(f.enrollment, f.lessons[1], true)
        .await
        .unwrap();
    let after = progress
        .set_completion(f.enrollment, f.lessons[1], false)
        .await
        .unwrap();

    assert_eq!(after.progress, before);
    let record = f
        .storage
        .completions
        .get_completion(f.enrollment, f.lessons[1])
        .await
        .unwrap()
        .unwrap();
    assert!(!record.is_completed());
    assert_eq!(record.completed_at(), None);
}

#[tokio::test]
async fn open_content_creates_record_once() {
    let f = fixture(2).await;
    let progress = f.app.progress();

    let opened = progress.open_content(f.enrollment, f.lessons[0]).await.unwrap();
    assert_eq!(opened.started_at(), Some(fixed_now()));
    assert!(!opened.is_completed());

    let again = progress.open_content(f.enrollment, f.lessons[0]).await.unwrap();
    assert_eq!(again, opened);
}

#[tokio::test]
async fn foreign_content_and_unapproved_enrollments_are_invalid() {
    let f = fixture(1).await;
    let start = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
    let second_class = f
        .app
        .classes()
        .create_class(ClassDraft::new(
            "Second",
            ClassSchedule::new(Cadence::Weekly, Some(start), 2).unwrap(),
        ))
        .await
        .unwrap()
        .class;
    let foreign = f
        .app
        .content()
        .add_content(second_class.id(), "Elsewhere", Some(1), 0, true)
        .await
        .unwrap();

    let err = f
        .app
        .progress()
        .set_completion(f.enrollment, foreign.id(), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressError::InvalidOperation(EnrollmentError::ContentOutsideClass { .. })
    ));

    let pending = f
        .app
        .enrollments()
        .enroll(second_class.id(), MemberId::new(2))
        .await
        .unwrap();
    let err = f
        .app
        .progress()
        .set_completion(pending.id(), foreign.id(), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressError::InvalidOperation(EnrollmentError::NotActive { .. })
    ));

    let err = f
        .app
        .progress()
        .content_overview(EnrollmentId::new(9_999))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::EnrollmentNotFound(_)));
}

#[tokio::test]
async fn unpublishing_keeps_percentage_in_range() {
    let f = fixture(2).await;
    let progress = f.app.progress();
    progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();
    progress
        .set_completion(f.enrollment, f.lessons[1], true)
        .await
        .unwrap();

    f.app.content().set_published(f.lessons[1], false).await.unwrap();
    let recalculated = progress.recalculate_metrics(f.enrollment).await.unwrap();
    assert_eq!(recalculated.completed_lessons(), 1);
    assert_eq!(recalculated.progress_percentage(), 100.0);

    let err = progress
        .set_completion(f.enrollment, f.lessons[1], false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::ContentUnavailable(_)));
}

#[tokio::test]
async fn class_without_content_reports_zero() {
    let f = fixture(0).await;
    let progress = f.app.progress();
    let recalculated = progress.recalculate_metrics(f.enrollment).await.unwrap();
    assert_eq!(recalculated.progress_percentage(), 0.0);
    assert_eq!(
        f.app.enrollments().get(f.enrollment).await.unwrap().status(),
        EnrollmentStatus::Active
    );
}

/// Persistence that always loses the optimistic-lock race.
struct AlwaysStale;

#[async_trait]
impl ProgressPersistence for AlwaysStale {
    async fn apply_completion(
        &self,
        _enrollment: &Enrollment,
        _completion: &ContentCompletion,
    ) -> Result<u64, StorageError> {
        Err(StorageError::Conflict)
    }
}

#[tokio::test]
async fn lost_race_surfaces_retryable_conflict_and_writes_nothing() {
    let f = fixture(2).await;
    let progress = ProgressService::new(
        Clock::fixed(fixed_now()),
        Arc::clone(&f.storage.content),
        Arc::clone(&f.storage.enrollments),
        Arc::clone(&f.storage.completions),
        Arc::new(AlwaysStale),
    );

    let err = progress
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::ConcurrencyConflict));
    assert!(err.is_retryable());

    assert!(
        f.storage
            .completions
            .completions_for(f.enrollment)
            .await
            .unwrap()
            .is_empty()
    );
    let overview = f.app.progress().content_overview(f.enrollment).await.unwrap();
    assert_eq!(overview.progress.completed_lessons(), 0);
}

#[tokio::test]
async fn stale_enrollment_snapshot_conflicts_in_storage() {
    let f = fixture(2).await;
    let snapshot = f.app.enrollments().get(f.enrollment).await.unwrap();

    f.app
        .progress()
        .set_completion(f.enrollment, f.lessons[0], true)
        .await
        .unwrap();

    let mut completion = ContentCompletion::start(f.enrollment, f.lessons[1], fixed_now());
    completion.set_completed(true, fixed_now());
    let err = f
        .storage
        .progress
        .apply_completion(&snapshot, &completion)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}
