use std::sync::Arc;

use disciple_core::model::{ClassId, Enrollment, EnrollmentError, EnrollmentId, MemberId};
use storage::repository::{ClassRepository, EnrollmentRepository, NewEnrollmentRecord, StorageError};
use tracing::info;

use crate::Clock;
use crate::error::EnrollmentServiceError;

/// Enrollment lifecycle: request, approve, drop.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    classes: Arc<dyn ClassRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        classes: Arc<dyn ClassRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            clock,
            classes,
            enrollments,
        }
    }

    /// Request a place in a class. New enrollments start as pending.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::ClassNotFound` for an unknown class and
    /// `EnrollmentServiceError::AlreadyEnrolled` if the member already has an
    /// enrollment there.
    pub async fn enroll(
        &self,
        class_id: ClassId,
        member_id: MemberId,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        if self.classes.get_class(class_id).await?.is_none() {
            return Err(EnrollmentServiceError::ClassNotFound(class_id));
        }

        let record = NewEnrollmentRecord {
            class_id,
            member_id,
            enrolled_at: self.clock.now(),
        };
        let id = match self.enrollments.insert_enrollment(record).await {
            Ok(id) => id,
            Err(StorageError::Conflict) => return Err(EnrollmentServiceError::AlreadyEnrolled),
            Err(StorageError::NotFound) => {
                return Err(EnrollmentServiceError::ClassNotFound(class_id));
            }
            Err(other) => return Err(other.into()),
        };

        info!(%class_id, %member_id, enrollment_id = %id, "enrollment requested");
        self.get(id).await
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the enrollment does not exist.
    pub async fn get(&self, id: EnrollmentId) -> Result<Enrollment, EnrollmentServiceError> {
        self.enrollments
            .get_enrollment(id)
            .await?
            .ok_or(EnrollmentServiceError::NotFound(id))
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn list(&self, class_id: ClassId) -> Result<Vec<Enrollment>, EnrollmentServiceError> {
        Ok(self.enrollments.list_enrollments(class_id).await?)
    }

    /// Approve a pending enrollment so the member can record progress.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Enrollment` unless the enrollment is
    /// pending, and `EnrollmentServiceError::ConcurrencyConflict` if it
    /// changed while being approved.
    pub async fn approve(&self, id: EnrollmentId) -> Result<Enrollment, EnrollmentServiceError> {
        self.update(id, Enrollment::approve).await
    }

    /// Withdraw a member from the class. Completion records are kept.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Enrollment` if already dropped.
    pub async fn drop_enrollment(
        &self,
        id: EnrollmentId,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        self.update(id, Enrollment::drop_out).await
    }

    async fn update(
        &self,
        id: EnrollmentId,
        change: impl FnOnce(&mut Enrollment) -> Result<(), EnrollmentError>,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        let mut enrollment = self.get(id).await?;
        change(&mut enrollment)?;
        self.enrollments.save_enrollment(&enrollment).await?;
        info!(enrollment_id = %id, status = %enrollment.status(), "enrollment status changed");
        self.get(id).await
    }
}
