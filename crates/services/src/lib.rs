#![forbid(unsafe_code)]

pub mod app_services;
pub mod attendance_service;
pub mod class_service;
pub mod content_service;
pub mod enrollment_service;
pub mod error;
pub mod progress_service;

pub use disciple_core::Clock;

pub use app_services::AppServices;
pub use attendance_service::{AttendanceService, AttendanceSummary};
pub use class_service::{ClassDraft, ClassService, CreatedClass};
pub use content_service::ContentService;
pub use enrollment_service::EnrollmentService;
pub use error::{
    AppServicesError, AttendanceServiceError, ClassServiceError, ContentServiceError,
    EnrollmentServiceError, ProgressError,
};
pub use progress_service::{
    CompletionOutcome, ContentOverview, ContentView, ProgressEvent, ProgressService,
};
