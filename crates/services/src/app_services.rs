use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::attendance_service::AttendanceService;
use crate::class_service::ClassService;
use crate::content_service::ContentService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles the workflow services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    classes: Arc<ClassService>,
    content: Arc<ContentService>,
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
    attendance: Arc<AttendanceService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let classes = Arc::new(ClassService::new(clock, Arc::clone(&storage.classes)));
        let content = Arc::new(ContentService::new(
            Arc::clone(&storage.classes),
            Arc::clone(&storage.content),
        ));
        let enrollments = Arc::new(EnrollmentService::new(
            clock,
            Arc::clone(&storage.classes),
            Arc::clone(&storage.enrollments),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.content),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.completions),
            Arc::clone(&storage.progress),
        ));
        let attendance = Arc::new(AttendanceService::new(
            clock,
            Arc::clone(&storage.classes),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.attendance),
        ));

        Self {
            classes,
            content,
            enrollments,
            progress,
            attendance,
        }
    }

    #[must_use]
    pub fn classes(&self) -> Arc<ClassService> {
        Arc::clone(&self.classes)
    }

    #[must_use]
    pub fn content(&self) -> Arc<ContentService> {
        Arc::clone(&self.content)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn attendance(&self) -> Arc<AttendanceService> {
        Arc::clone(&self.attendance)
    }
}
