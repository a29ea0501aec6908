use thiserror::Error;

use crate::model::{
    AttendanceError, ClassError, CompletionError, ContentError, EnrollmentError, ScheduleError,
};

/// Umbrella error for callers that want a single domain error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Class(#[from] ClassError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}
