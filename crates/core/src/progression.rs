use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{
    ContentCompletion, ContentId, ContentItem, Enrollment, EnrollmentError, EnrollmentProgress,
};

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Per-item view of an enrollment's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub completed: bool,
    pub locked: bool,
}

impl ProgressState {
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        !self.locked
    }
}

/// Index completion records by content id.
#[must_use]
pub fn completion_map(
    records: impl IntoIterator<Item = ContentCompletion>,
) -> HashMap<ContentId, ContentCompletion> {
    records
        .into_iter()
        .map(|record| (record.content_id(), record))
        .collect()
}

/// Lock state for each item, in the order given.
///
/// `ordered_published` must already be in canonical order (see
/// `model::published_in_order`). An item is unlocked when every item before
/// it is completed, or when it is completed itself. The first incomplete item
/// breaks the chain for good; later completed items stay visible but do not
/// repair it.
#[must_use]
pub fn ordered_progress_states(
    ordered_published: &[ContentItem],
    completions: &HashMap<ContentId, ContentCompletion>,
) -> Vec<(ContentId, ProgressState)> {
    let mut chain_intact = true;
    let mut states = Vec::with_capacity(ordered_published.len());

    for item in ordered_published {
        let completed = completions
            .get(&item.id())
            .is_some_and(ContentCompletion::is_completed);
        let locked = !chain_intact && !completed;
        states.push((item.id(), ProgressState { completed, locked }));

        if !completed {
            chain_intact = false;
        }
    }

    states
}

/// Lock state for each item, keyed by content id.
#[must_use]
pub fn build_progress_states(
    ordered_published: &[ContentItem],
    completions: &HashMap<ContentId, ContentCompletion>,
) -> HashMap<ContentId, ProgressState> {
    ordered_progress_states(ordered_published, completions)
        .into_iter()
        .collect()
}

/// The first unlocked, not yet completed item: where the member resumes.
#[must_use]
pub fn next_lesson(
    ordered_published: &[ContentItem],
    completions: &HashMap<ContentId, ContentCompletion>,
) -> Option<ContentId> {
    ordered_progress_states(ordered_published, completions)
        .into_iter()
        .find(|(_, state)| !state.completed && !state.locked)
        .map(|(id, _)| id)
}

//
// ─── MUTATION ──────────────────────────────────────────────────────────────────
//

/// Apply a completion toggle to an enrollment's record for `content`.
///
/// Creates the record when `existing` is `None` (`started_at = now`). Lock
/// state is not checked here; callers consult `build_progress_states` before
/// offering the action.
///
/// # Errors
///
/// Returns `EnrollmentError::NotActive` if the enrollment may not record
/// progress, and `EnrollmentError::ContentOutsideClass` if `content` belongs
/// to another class.
pub fn apply_completion(
    enrollment: &Enrollment,
    content: &ContentItem,
    existing: Option<ContentCompletion>,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<ContentCompletion, EnrollmentError> {
    enrollment.ensure_can_record_progress()?;
    enrollment.ensure_owns(content)?;

    let mut record = existing
        .filter(|r| r.enrollment_id() == enrollment.id() && r.content_id() == content.id())
        .unwrap_or_else(|| ContentCompletion::start(enrollment.id(), content.id(), now));
    record.set_completed(completed, now);
    Ok(record)
}

//
// ─── METRICS ───────────────────────────────────────────────────────────────────
//

/// Recompute completion metrics from scratch.
///
/// `completed_lessons` is the number of completed records whose item is in
/// `ordered_published`, not the number of completed records overall. Records
/// for items that were unpublished or deleted stay in storage but are not
/// counted. This rule keeps `completed_lessons <= published` and the
/// percentage within `[0, 100]`. With no published content the percentage
/// is 0.
#[must_use]
pub fn recalculate_metrics(
    ordered_published: &[ContentItem],
    completions: &HashMap<ContentId, ContentCompletion>,
) -> EnrollmentProgress {
    let completed = ordered_published
        .iter()
        .filter(|item| {
            completions
                .get(&item.id())
                .is_some_and(ContentCompletion::is_completed)
        })
        .count();

    let completed = u32::try_from(completed).unwrap_or(u32::MAX);
    let total = u32::try_from(ordered_published.len()).unwrap_or(u32::MAX);
    EnrollmentProgress::new(completed, percentage(completed, total))
}

/// `part / whole * 100`, rounded to two decimals; 0 when `whole` is 0.
#[must_use]
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let ratio = f64::from(part) / f64::from(whole);
    (ratio * 10_000.0).round() / 100.0
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
