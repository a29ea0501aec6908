use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use disciple_core::model::{
    ContentCompletion, ContentId, ContentItem, Enrollment, EnrollmentError, EnrollmentId,
    EnrollmentProgress, EnrollmentStatus,
};
use disciple_core::progression::{
    self, ProgressState, build_progress_states, completion_map, next_lesson, ordered_progress_states,
    recalculate_metrics,
};
use storage::repository::{
    CompletionRepository, ContentRepository, EnrollmentRepository, ProgressPersistence,
};

use crate::Clock;
use crate::error::ProgressError;

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Domain events produced by a completion write, returned to the caller
/// instead of fired through hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    LessonCompleted {
        enrollment: EnrollmentId,
        content: ContentId,
    },
    LessonReopened {
        enrollment: EnrollmentId,
        content: ContentId,
    },
    /// Every published lesson is now complete; the enrollment moved to
    /// `Completed`.
    CourseCompleted { enrollment: EnrollmentId },
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentView {
    pub item: ContentItem,
    pub state: ProgressState,
}

/// What a member sees for a class: lessons in order with lock state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentOverview {
    pub enrollment: EnrollmentId,
    pub status: EnrollmentStatus,
    pub items: Vec<ContentView>,
    pub progress: EnrollmentProgress,
    pub attendance_rate: f64,
    pub next_lesson: Option<ContentId>,
}

/// Result of a completion write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    pub completion: ContentCompletion,
    pub progress: EnrollmentProgress,
    pub status: EnrollmentStatus,
    pub version: u64,
    pub events: Vec<ProgressEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockGuard {
    Enforce,
    Skip,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Member-facing progression workflow over stored classes and enrollments.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    content: Arc<dyn ContentRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    completions: Arc<dyn CompletionRepository>,
    progress: Arc<dyn ProgressPersistence>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        content: Arc<dyn ContentRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        completions: Arc<dyn CompletionRepository>,
        progress: Arc<dyn ProgressPersistence>,
    ) -> Self {
        Self {
            clock,
            content,
            enrollments,
            completions,
            progress,
        }
    }

    /// Published lessons in order with their completed/locked state.
    ///
    /// Progress and status are computed from the live records, not read
    /// from the cached projection, so they agree with the lock states even
    /// after lessons were added or published. The stored projection catches
    /// up on the next completion write or `recalculate_metrics`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EnrollmentNotFound` for an unknown enrollment,
    /// or `ProgressError::Storage` if repository access fails.
    pub async fn content_overview(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<ContentOverview, ProgressError> {
        let mut enrollment = self.enrollment(enrollment_id).await?;
        let published = self.content.published_content(enrollment.class_id()).await?;
        let completions = completion_map(self.completions.completions_for(enrollment_id).await?);

        let states = ordered_progress_states(&published, &completions);
        let next = next_lesson(&published, &completions);
        let progress = recalculate_metrics(&published, &completions);
        if progress != enrollment.progress() {
            debug!(
                %enrollment_id,
                cached = enrollment.progress().progress_percentage(),
                live = progress.progress_percentage(),
                "cached metrics are stale"
            );
        }
        enrollment.apply_progress(progress);
        self.settle_status(&mut enrollment)?;
        debug!(%enrollment_id, items = published.len(), ?next, "built progress states");

        let items = published
            .into_iter()
            .zip(states)
            .map(|(item, (_, state))| ContentView { item, state })
            .collect();

        Ok(ContentOverview {
            enrollment: enrollment_id,
            status: enrollment.status(),
            items,
            progress,
            attendance_rate: enrollment.attendance_rate(),
            next_lesson: next,
        })
    }

    /// Open a lesson. The first open creates the completion record with
    /// `started_at`; later opens return it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ContentLocked` when earlier lessons are not yet
    /// complete, `ProgressError::InvalidOperation` for content outside the
    /// class or an enrollment that may not record progress, and
    /// `ProgressError::ContentUnavailable` for missing or unpublished content.
    pub async fn open_content(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
    ) -> Result<ContentCompletion, ProgressError> {
        let enrollment = self.enrollment(enrollment_id).await?;
        enrollment.ensure_can_record_progress()?;
        let content = self.published_item(&enrollment, content_id).await?;
        let published = self.content.published_content(enrollment.class_id()).await?;
        let completions = completion_map(self.completions.completions_for(enrollment_id).await?);

        ensure_unlocked(&published, &completions, content.id())?;

        let record = self
            .completions
            .start_completion(&ContentCompletion::start(
                enrollment_id,
                content_id,
                self.clock.now(),
            ))
            .await?;
        debug!(%enrollment_id, %content_id, "content opened");
        Ok(record)
    }

    /// Mark a lesson complete or not, as the member.
    ///
    /// The lesson must be unlocked. The completion record and the recomputed
    /// enrollment metrics are written together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ContentLocked` for a locked lesson,
    /// `ProgressError::InvalidOperation` for content outside the class or an
    /// enrollment that may not record progress, and
    /// `ProgressError::ConcurrencyConflict` (retryable) if the enrollment was
    /// written concurrently.
    pub async fn set_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
        completed: bool,
    ) -> Result<CompletionOutcome, ProgressError> {
        self.write_completion(enrollment_id, content_id, completed, LockGuard::Enforce)
            .await
    }

    /// Staff path: set completion without the lock check, e.g. to credit a
    /// lesson covered out of order.
    ///
    /// # Errors
    ///
    /// As `set_completion`, minus `ContentLocked`.
    pub async fn override_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
        completed: bool,
    ) -> Result<CompletionOutcome, ProgressError> {
        self.write_completion(enrollment_id, content_id, completed, LockGuard::Skip)
            .await
    }

    /// Recompute and store an enrollment's metrics from its completion
    /// records, e.g. after lessons were published or unpublished.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ConcurrencyConflict` if the enrollment changed
    /// concurrently, or `ProgressError::Storage` on backend failures.
    pub async fn recalculate_metrics(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<EnrollmentProgress, ProgressError> {
        let mut enrollment = self.enrollment(enrollment_id).await?;
        let published = self.content.published_content(enrollment.class_id()).await?;
        let completions = completion_map(self.completions.completions_for(enrollment_id).await?);

        let progress = recalculate_metrics(&published, &completions);
        enrollment.apply_progress(progress);
        let events = self.settle_status(&mut enrollment)?;
        self.enrollments
            .save_enrollment(&enrollment)
            .await
            .inspect_err(|e| warn!(%enrollment_id, error = %e, "metrics write rejected"))?;

        info!(
            %enrollment_id,
            completed = progress.completed_lessons(),
            percentage = progress.progress_percentage(),
            events = events.len(),
            "metrics recalculated"
        );
        Ok(progress)
    }

    async fn write_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
        completed: bool,
        guard: LockGuard,
    ) -> Result<CompletionOutcome, ProgressError> {
        let mut enrollment = self.enrollment(enrollment_id).await?;
        enrollment.ensure_can_record_progress()?;
        let content = self.published_item(&enrollment, content_id).await?;
        let published = self.content.published_content(enrollment.class_id()).await?;
        let mut completions =
            completion_map(self.completions.completions_for(enrollment_id).await?);

        if guard == LockGuard::Enforce {
            ensure_unlocked(&published, &completions, content_id)?;
        }

        let existing = completions.remove(&content_id);
        let was_completed = existing
            .as_ref()
            .is_some_and(ContentCompletion::is_completed);
        let record = progression::apply_completion(
            &enrollment,
            &content,
            existing,
            completed,
            self.clock.now(),
        )?;
        completions.insert(content_id, record.clone());

        let progress = recalculate_metrics(&published, &completions);
        enrollment.apply_progress(progress);

        let mut events = Vec::new();
        match (was_completed, completed) {
            (false, true) => events.push(ProgressEvent::LessonCompleted {
                enrollment: enrollment_id,
                content: content_id,
            }),
            (true, false) => events.push(ProgressEvent::LessonReopened {
                enrollment: enrollment_id,
                content: content_id,
            }),
            _ => {}
        }
        events.extend(self.settle_status(&mut enrollment)?);

        let version = match self.progress.apply_completion(&enrollment, &record).await {
            Ok(version) => version,
            Err(err) => {
                let err = ProgressError::from(err);
                if err.is_retryable() {
                    warn!(%enrollment_id, %content_id, "completion write lost a concurrent update");
                }
                return Err(err);
            }
        };

        info!(
            %enrollment_id,
            %content_id,
            completed,
            percentage = progress.progress_percentage(),
            overridden = guard == LockGuard::Skip,
            "completion recorded"
        );
        for event in &events {
            if let ProgressEvent::CourseCompleted { .. } = event {
                info!(%enrollment_id, "course completed");
            }
        }

        Ok(CompletionOutcome {
            completion: record,
            progress,
            status: enrollment.status(),
            version,
            events,
        })
    }

    /// Move the enrollment between `Active` and `Completed` to match its
    /// freshly applied metrics.
    fn settle_status(
        &self,
        enrollment: &mut Enrollment,
    ) -> Result<Vec<ProgressEvent>, EnrollmentError> {
        let complete = enrollment.progress().is_complete();
        match enrollment.status() {
            EnrollmentStatus::Active if complete => {
                enrollment.mark_completed(self.clock.now())?;
                Ok(vec![ProgressEvent::CourseCompleted {
                    enrollment: enrollment.id(),
                }])
            }
            EnrollmentStatus::Completed if !complete => {
                enrollment.reopen()?;
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn enrollment(&self, id: EnrollmentId) -> Result<Enrollment, ProgressError> {
        self.enrollments
            .get_enrollment(id)
            .await?
            .ok_or(ProgressError::EnrollmentNotFound(id))
    }

    async fn published_item(
        &self,
        enrollment: &Enrollment,
        content_id: ContentId,
    ) -> Result<ContentItem, ProgressError> {
        let content = self
            .content
            .get_content(content_id)
            .await?
            .ok_or(ProgressError::ContentUnavailable(content_id))?;
        enrollment.ensure_owns(&content)?;
        if !content.is_published() {
            return Err(ProgressError::ContentUnavailable(content_id));
        }
        Ok(content)
    }
}

fn ensure_unlocked(
    published: &[ContentItem],
    completions: &HashMap<ContentId, ContentCompletion>,
    content_id: ContentId,
) -> Result<(), ProgressError> {
    let locked = build_progress_states(published, completions)
        .get(&content_id)
        .is_none_or(|state| state.locked);
    if locked {
        return Err(ProgressError::ContentLocked(content_id));
    }
    Ok(())
}
