use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ContentId, EnrollmentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("completed record for content {0} has no completed_at")]
    MissingCompletedAt(ContentId),

    #[error("open record for content {0} carries a completed_at")]
    StrayCompletedAt(ContentId),
}

/// A member's interaction with one content item.
///
/// Created on first interaction and never deleted while the enrollment
/// exists. `completed_at` is set exactly when `is_completed` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCompletion {
    enrollment_id: EnrollmentId,
    content_id: ContentId,
    is_completed: bool,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ContentCompletion {
    /// A new, open record stamped with `started_at = now`.
    #[must_use]
    pub fn start(enrollment_id: EnrollmentId, content_id: ContentId, now: DateTime<Utc>) -> Self {
        Self {
            enrollment_id,
            content_id,
            is_completed: false,
            started_at: Some(now),
            completed_at: None,
        }
    }

    /// Rehydrates a stored record.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError` when `completed_at` disagrees with `is_completed`.
    pub fn from_persisted(
        enrollment_id: EnrollmentId,
        content_id: ContentId,
        is_completed: bool,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, CompletionError> {
        match (is_completed, completed_at) {
            (true, None) => return Err(CompletionError::MissingCompletedAt(content_id)),
            (false, Some(_)) => return Err(CompletionError::StrayCompletedAt(content_id)),
            _ => {}
        }

        Ok(Self {
            enrollment_id,
            content_id,
            is_completed,
            started_at,
            completed_at,
        })
    }

    /// Set or clear completion. Re-completing keeps the original timestamp.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed {
            if !self.is_completed {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
        self.is_completed = completed;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    #[must_use]
    pub fn enrollment_id(&self) -> EnrollmentId {
        self.enrollment_id
    }

    #[must_use]
    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn record() -> ContentCompletion {
        ContentCompletion::start(EnrollmentId::new(1), ContentId::new(2), fixed_now())
    }

    #[test]
    fn start_records_started_at_only() {
        let c = record();
        assert!(!c.is_completed());
        assert_eq!(c.started_at(), Some(fixed_now()));
        assert_eq!(c.completed_at(), None);
    }

    #[test]
    fn toggling_sets_and_clears_completed_at() {
        let mut c = record();
        let later = fixed_now() + Duration::minutes(30);

        c.set_completed(true, later);
        assert!(c.is_completed());
        assert_eq!(c.completed_at(), Some(later));

        c.set_completed(true, later + Duration::minutes(5));
        assert_eq!(c.completed_at(), Some(later));

        c.set_completed(false, later + Duration::minutes(10));
        assert!(!c.is_completed());
        assert_eq!(c.completed_at(), None);
        assert_eq!(c.started_at(), Some(fixed_now()));
    }

    #[test]
    fn persisted_record_must_be_consistent() {
        let err = ContentCompletion::from_persisted(
            EnrollmentId::new(1),
            ContentId::new(2),
            true,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, CompletionError::MissingCompletedAt(ContentId::new(2)));

        let err = ContentCompletion::from_persisted(
            EnrollmentId::new(1),
            ContentId::new(2),
            false,
            None,
            Some(fixed_now()),
        )
        .unwrap_err();
        assert_eq!(err, CompletionError::StrayCompletedAt(ContentId::new(2)));
    }
}
