use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::content::ContentItem;
use crate::model::ids::{ClassId, ContentId, EnrollmentId, MemberId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected enrollment operations.
///
/// `NotActive` and `ContentOutsideClass` are the engine's invalid-operation
/// cases; callers map them to a user-facing rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("enrollment {enrollment} is {status}, progress cannot change")]
    NotActive {
        enrollment: EnrollmentId,
        status: EnrollmentStatus,
    },

    #[error("content {content} does not belong to class {class}")]
    ContentOutsideClass { content: ContentId, class: ClassId },

    #[error("cannot move enrollment from {from} to {to}")]
    InvalidTransition {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },

    #[error("invalid persisted progress: {0}")]
    InvalidProgress(String),

    #[error("unknown enrollment status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Requested, waiting for approval.
    Pending,
    /// Approved; the member is working through the class.
    Active,
    /// Every published lesson is complete.
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrollmentStatus::Pending),
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            other => Err(EnrollmentError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Cached projection of an enrollment's completion records.
///
/// Only `progression::recalculate_metrics` builds fresh values; storage
/// rehydrates through `from_persisted`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    completed_lessons: u32,
    progress_percentage: f64,
}

impl EnrollmentProgress {
    pub(crate) fn new(completed_lessons: u32, progress_percentage: f64) -> Self {
        Self {
            completed_lessons,
            progress_percentage,
        }
    }

    /// Rehydrates stored metrics.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidProgress` if the percentage is not a
    /// finite value in `[0, 100]`.
    pub fn from_persisted(
        completed_lessons: u32,
        progress_percentage: f64,
    ) -> Result<Self, EnrollmentError> {
        if !progress_percentage.is_finite() || !(0.0..=100.0).contains(&progress_percentage) {
            return Err(EnrollmentError::InvalidProgress(format!(
                "progress_percentage {progress_percentage}"
            )));
        }
        Ok(Self::new(completed_lessons, progress_percentage))
    }

    #[must_use]
    pub fn completed_lessons(&self) -> u32 {
        self.completed_lessons
    }

    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_lessons > 0 && self.progress_percentage >= 100.0
    }
}

//
// ─── ENROLLMENT ────────────────────────────────────────────────────────────────
//

/// A member's place in a class, carrying approval status and derived metrics.
///
/// `version` is the optimistic-lock counter; storage bumps it on every
/// progress write.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    id: EnrollmentId,
    class_id: ClassId,
    member_id: MemberId,
    status: EnrollmentStatus,
    progress: EnrollmentProgress,
    attendance_rate: f64,
    version: u64,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// A fresh, pending enrollment with zeroed metrics.
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        class_id: ClassId,
        member_id: MemberId,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            class_id,
            member_id,
            status: EnrollmentStatus::Pending,
            progress: EnrollmentProgress::default(),
            attendance_rate: 0.0,
            version: 0,
            enrolled_at,
            completed_at: None,
        }
    }

    /// Rehydrates an enrollment from storage.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidProgress` if the attendance rate is not
    /// a finite value in `[0, 100]`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: EnrollmentId,
        class_id: ClassId,
        member_id: MemberId,
        status: EnrollmentStatus,
        progress: EnrollmentProgress,
        attendance_rate: f64,
        version: u64,
        enrolled_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, EnrollmentError> {
        if !attendance_rate.is_finite() || !(0.0..=100.0).contains(&attendance_rate) {
            return Err(EnrollmentError::InvalidProgress(format!(
                "attendance_rate {attendance_rate}"
            )));
        }

        Ok(Self {
            id,
            class_id,
            member_id,
            status,
            progress,
            attendance_rate,
            version,
            enrolled_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: EnrollmentId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn id(&self) -> EnrollmentId {
        self.id
    }

    #[must_use]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    #[must_use]
    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn progress(&self) -> EnrollmentProgress {
        self.progress
    }

    /// Percentage of held, non-excused sessions attended.
    #[must_use]
    pub fn attendance_rate(&self) -> f64 {
        self.attendance_rate
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Approve a pending enrollment.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` unless the enrollment is pending.
    pub fn approve(&mut self) -> Result<(), EnrollmentError> {
        self.transition(EnrollmentStatus::Pending, EnrollmentStatus::Active)
    }

    /// Withdraw from the class. Allowed from any status except `Dropped`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` if already dropped.
    pub fn drop_out(&mut self) -> Result<(), EnrollmentError> {
        if self.status == EnrollmentStatus::Dropped {
            return Err(EnrollmentError::InvalidTransition {
                from: self.status,
                to: EnrollmentStatus::Dropped,
            });
        }
        self.status = EnrollmentStatus::Dropped;
        Ok(())
    }

    /// Mark the class finished.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` unless the enrollment is active.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<(), EnrollmentError> {
        self.transition(EnrollmentStatus::Active, EnrollmentStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Return a completed enrollment to active, e.g. after a lesson is reopened.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidTransition` unless the enrollment is completed.
    pub fn reopen(&mut self) -> Result<(), EnrollmentError> {
        self.transition(EnrollmentStatus::Completed, EnrollmentStatus::Active)?;
        self.completed_at = None;
        Ok(())
    }

    /// Progress may change only for approved enrollments that are still open
    /// or already completed.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::NotActive` for pending or dropped enrollments.
    pub fn ensure_can_record_progress(&self) -> Result<(), EnrollmentError> {
        match self.status {
            EnrollmentStatus::Active | EnrollmentStatus::Completed => Ok(()),
            status => Err(EnrollmentError::NotActive {
                enrollment: self.id,
                status,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::ContentOutsideClass` if `content` belongs to
    /// another class.
    pub fn ensure_owns(&self, content: &ContentItem) -> Result<(), EnrollmentError> {
        if content.class_id() != self.class_id {
            return Err(EnrollmentError::ContentOutsideClass {
                content: content.id(),
                class: self.class_id,
            });
        }
        Ok(())
    }

    /// Replace the cached completion metrics.
    pub fn apply_progress(&mut self, progress: EnrollmentProgress) {
        self.progress = progress;
    }

    /// Replace the cached attendance rate. Values are clamped to `[0, 100]`.
    pub fn apply_attendance_rate(&mut self, rate: f64) {
        self.attendance_rate = if rate.is_finite() {
            rate.clamp(0.0, 100.0)
        } else {
            0.0
        };
    }

    fn transition(
        &mut self,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<(), EnrollmentError> {
        if self.status != from {
            return Err(EnrollmentError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
