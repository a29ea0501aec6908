use std::sync::Arc;

use disciple_core::model::{
    Class, ClassId, ClassSchedule, ClassSession, CreationKey, SessionPlanEntry,
};
use disciple_core::scheduler::{expected_session_count, generate_sessions};
use storage::repository::{ClassRepository, NewClassRecord, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::ClassServiceError;

/// Input for creating a class.
#[derive(Debug, Clone)]
pub struct ClassDraft {
    pub name: String,
    pub description: Option<String>,
    pub schedule: ClassSchedule,
    /// Explicit session topics; the plan stops when they run out.
    pub topics: Option<Vec<String>>,
    /// Per-session notes, matched to sessions by position.
    pub content_notes: Option<Vec<String>>,
    pub creation_key: CreationKey,
    /// Fail instead of silently creating a class with no sessions.
    pub require_sessions: bool,
}

impl ClassDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, schedule: ClassSchedule) -> Self {
        Self {
            name: name.into(),
            description: None,
            schedule,
            topics: None,
            content_notes: None,
            creation_key: CreationKey::new_random(),
            require_sessions: false,
        }
    }
}

/// A stored class with its sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedClass {
    pub class: Class,
    pub sessions: Vec<ClassSession>,
    /// `false` when the creation key matched an existing class.
    pub created: bool,
}

/// Orchestrates class creation: validation, session generation and
/// persistence.
#[derive(Clone)]
pub struct ClassService {
    clock: Clock,
    classes: Arc<dyn ClassRepository>,
}

impl ClassService {
    #[must_use]
    pub fn new(clock: Clock, classes: Arc<dyn ClassRepository>) -> Self {
        Self { clock, classes }
    }

    /// Session plan a schedule would produce, without persisting anything.
    #[must_use]
    pub fn preview_sessions(
        schedule: &ClassSchedule,
        topics: Option<&[String]>,
        content_notes: Option<&[String]>,
    ) -> Vec<SessionPlanEntry> {
        generate_sessions(schedule, topics, content_notes)
    }

    /// Create a class and its sessions exactly once per creation key.
    ///
    /// Repeating a request with the same `creation_key` returns the class
    /// stored by the first request with `created = false`.
    ///
    /// # Errors
    ///
    /// Returns `ClassServiceError::Class` for validation failures,
    /// `ClassServiceError::Configuration` when `require_sessions` is set and
    /// the schedule has no start date, and `ClassServiceError::Storage` if
    /// persistence fails.
    pub async fn create_class(&self, draft: ClassDraft) -> Result<CreatedClass, ClassServiceError> {
        if let Some(existing) = self.classes.find_by_creation_key(draft.creation_key).await? {
            info!(class_id = %existing.id(), key = %draft.creation_key, "class creation deduplicated");
            return self.load(existing, false).await;
        }

        let class = Class::new(
            ClassId::new(0),
            draft.name,
            draft.description,
            draft.schedule,
            draft.creation_key,
            self.clock.now(),
        )?;
        let schedule = class.schedule();

        if draft.require_sessions && schedule.start_date().is_none() {
            return Err(ClassServiceError::Configuration(
                "sessions were requested but the schedule has no start date".into(),
            ));
        }

        let plan = generate_sessions(
            schedule,
            draft.topics.as_deref(),
            draft.content_notes.as_deref(),
        );
        debug!(cadence = %schedule.cadence(), sessions = plan.len(), "generated session plan");

        if let Some(expected) = expected_session_count(schedule) {
            let produced = u32::try_from(plan.len()).unwrap_or(u32::MAX);
            if produced < expected {
                warn!(
                    expected,
                    produced, "fewer sessions than the schedule implies; topic list ran out"
                );
            }
        }

        let class_id = match self
            .classes
            .insert_class_with_sessions(NewClassRecord::from_class(&class), &plan)
            .await
        {
            Ok(id) => id,
            Err(StorageError::Conflict) => {
                // A concurrent request with the same key committed first.
                let existing = self
                    .classes
                    .find_by_creation_key(class.creation_key())
                    .await?
                    .ok_or(StorageError::NotFound)?;
                return self.load(existing, false).await;
            }
            Err(other) => return Err(other.into()),
        };

        info!(%class_id, sessions = plan.len(), "class created");
        self.load(class.with_id(class_id), true).await
    }

    /// Fetch a class by ID.
    ///
    /// # Errors
    ///
    /// Returns `ClassServiceError::NotFound` if the class does not exist.
    pub async fn get_class(&self, id: ClassId) -> Result<Class, ClassServiceError> {
        self.classes
            .get_class(id)
            .await?
            .ok_or(ClassServiceError::NotFound(id))
    }

    /// # Errors
    ///
    /// Returns `ClassServiceError::Storage` if repository access fails.
    pub async fn sessions(&self, id: ClassId) -> Result<Vec<ClassSession>, ClassServiceError> {
        Ok(self.classes.list_sessions(id).await?)
    }

    async fn load(&self, class: Class, created: bool) -> Result<CreatedClass, ClassServiceError> {
        let sessions = self.classes.list_sessions(class.id()).await?;
        Ok(CreatedClass {
            class,
            sessions,
            created,
        })
    }
}
