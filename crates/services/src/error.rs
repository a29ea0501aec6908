//! Shared error types for the services crate.

use thiserror::Error;

use disciple_core::model::{
    ClassError, ClassId, ContentError, ContentId, EnrollmentError, EnrollmentId, SessionId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ClassService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassServiceError {
    #[error(transparent)]
    Class(#[from] ClassError),
    /// Sessions were required but the schedule cannot produce any.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("class {0} not found")]
    NotFound(ClassId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ContentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentServiceError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("class {0} not found")]
    ClassNotFound(ClassId),
    #[error("content {0} not found")]
    NotFound(ContentId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("class {0} not found")]
    ClassNotFound(ClassId),
    #[error("enrollment {0} not found")]
    NotFound(EnrollmentId),
    #[error("member is already enrolled in this class")]
    AlreadyEnrolled,
    #[error("enrollment changed concurrently; retry")]
    ConcurrencyConflict,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EnrollmentServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::ConcurrencyConflict,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    /// Content outside the enrollment's class, or an enrollment that may not
    /// record progress.
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] EnrollmentError),
    #[error("content {0} is locked until earlier lessons are completed")]
    ContentLocked(ContentId),
    #[error("content {0} is not available")]
    ContentUnavailable(ContentId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    /// Another write to the same enrollment won the race.
    #[error("enrollment changed concurrently; retry")]
    ConcurrencyConflict,
    #[error(transparent)]
    Storage(StorageError),
}

impl ProgressError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

impl From<StorageError> for ProgressError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::ConcurrencyConflict,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `AttendanceService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttendanceServiceError {
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("session {0} does not belong to the enrollment's class")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("enrollment changed concurrently; retry")]
    ConcurrencyConflict,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AttendanceServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::ConcurrencyConflict,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
