mod attendance;
mod class;
mod completion;
pub mod content;
mod enrollment;
mod ids;
mod schedule;
mod session;

pub use attendance::{AttendanceError, AttendanceRecord, AttendanceStatus, attendance_rate};
pub use class::{Class, ClassError};
pub use completion::{CompletionError, ContentCompletion};
pub use content::{ContentError, ContentItem, published_in_order, sort_canonical};
pub use enrollment::{Enrollment, EnrollmentError, EnrollmentProgress, EnrollmentStatus};
pub use ids::{ClassId, ContentId, CreationKey, EnrollmentId, MemberId, ParseIdError, SessionId};
pub use schedule::{Cadence, ClassSchedule, MAX_DURATION_WEEKS, ScheduleError};
pub use session::{ClassSession, SessionPlanEntry};
