use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use disciple_core::model::{
    AttendanceRecord, AttendanceStatus, ClassSession, Enrollment, EnrollmentId, SessionId,
    attendance_rate,
};
use storage::repository::{AttendanceRepository, ClassRepository, EnrollmentRepository};

use crate::Clock;
use crate::error::AttendanceServiceError;

/// Attendance figures for one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub enrollment: EnrollmentId,
    /// Sessions dated on or before today.
    pub held_sessions: usize,
    pub rate: f64,
}

/// Records session attendance and keeps the enrollment's attendance rate
/// current. The rate is tracked separately from lesson progress.
#[derive(Clone)]
pub struct AttendanceService {
    clock: Clock,
    classes: Arc<dyn ClassRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    attendance: Arc<dyn AttendanceRepository>,
}

impl AttendanceService {
    #[must_use]
    pub fn new(
        clock: Clock,
        classes: Arc<dyn ClassRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        attendance: Arc<dyn AttendanceRepository>,
    ) -> Self {
        Self {
            clock,
            classes,
            enrollments,
            attendance,
        }
    }

    /// Record (or correct) a member's attendance at a session and refresh the
    /// cached rate on the enrollment.
    ///
    /// # Errors
    ///
    /// Returns `AttendanceServiceError::UnknownSession` if the session is not
    /// part of the enrollment's class, `AttendanceServiceError::Enrollment` for
    /// pending or dropped enrollments, and
    /// `AttendanceServiceError::ConcurrencyConflict` if the enrollment changed
    /// concurrently.
    pub async fn record(
        &self,
        enrollment_id: EnrollmentId,
        session_id: SessionId,
        status: AttendanceStatus,
    ) -> Result<AttendanceSummary, AttendanceServiceError> {
        let mut enrollment = self.enrollment(enrollment_id).await?;
        enrollment.ensure_can_record_progress()?;

        let sessions = self.classes.list_sessions(enrollment.class_id()).await?;
        if !sessions.iter().any(|s| s.id == session_id) {
            return Err(AttendanceServiceError::UnknownSession(session_id));
        }

        let record = AttendanceRecord::new(session_id, enrollment_id, status, self.clock.now());
        let mut records = self.attendance.attendance_for(enrollment_id).await?;
        records.retain(|r| r.session_id != session_id);
        records.push(record.clone());

        let held = held_sessions(&sessions, self.clock.today());
        let rate = attendance_rate(held.iter().copied(), &records);
        enrollment.apply_attendance_rate(rate);

        self.attendance
            .apply_attendance(&enrollment, &record)
            .await
            .inspect_err(|e| {
                warn!(%enrollment_id, %session_id, error = %e, "attendance write rejected");
            })?;
        info!(%enrollment_id, %session_id, %status, rate, "attendance recorded");

        Ok(AttendanceSummary {
            enrollment: enrollment_id,
            held_sessions: held.len(),
            rate: enrollment.attendance_rate(),
        })
    }

    /// Current attendance figures without writing anything.
    ///
    /// # Errors
    ///
    /// Returns `AttendanceServiceError::EnrollmentNotFound` for an unknown
    /// enrollment, or storage errors.
    pub async fn summary(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<AttendanceSummary, AttendanceServiceError> {
        let enrollment = self.enrollment(enrollment_id).await?;
        let (held, rate) = self.compute(&enrollment).await?;
        Ok(AttendanceSummary {
            enrollment: enrollment_id,
            held_sessions: held,
            rate,
        })
    }

    async fn compute(
        &self,
        enrollment: &Enrollment,
    ) -> Result<(usize, f64), AttendanceServiceError> {
        let sessions = self.classes.list_sessions(enrollment.class_id()).await?;
        let held = held_sessions(&sessions, self.clock.today());
        let records = self.attendance.attendance_for(enrollment.id()).await?;
        Ok((held.len(), attendance_rate(held, &records)))
    }

    async fn enrollment(&self, id: EnrollmentId) -> Result<Enrollment, AttendanceServiceError> {
        self.enrollments
            .get_enrollment(id)
            .await?
            .ok_or(AttendanceServiceError::EnrollmentNotFound(id))
    }
}

fn held_sessions(sessions: &[ClassSession], today: NaiveDate) -> Vec<SessionId> {
    sessions
        .iter()
        .filter(|s| s.has_been_held(today))
        .map(|s| s.id)
        .collect()
}
