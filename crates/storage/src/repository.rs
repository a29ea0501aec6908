use async_trait::async_trait;
use chrono::{DateTime, Utc};
use disciple_core::model::{
    AttendanceRecord, Class, ClassId, ClassSchedule, ClassSession, ContentCompletion, ContentId,
    ContentItem, CreationKey, Enrollment, EnrollmentId, MemberId, SessionId, SessionPlanEntry,
    sort_canonical,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness or optimistic-version check failed.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Insert payload for a class whose id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewClassRecord {
    pub name: String,
    pub description: Option<String>,
    pub schedule: ClassSchedule,
    pub creation_key: CreationKey,
    pub created_at: DateTime<Utc>,
}

impl NewClassRecord {
    #[must_use]
    pub fn from_class(class: &Class) -> Self {
        Self {
            name: class.name().to_owned(),
            description: class.description().map(ToOwned::to_owned),
            schedule: class.schedule().clone(),
            creation_key: class.creation_key(),
            created_at: class.created_at(),
        }
    }
}

/// Insert payload for a content item whose id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewContentRecord {
    pub class_id: ClassId,
    pub title: String,
    pub week_number: Option<u32>,
    pub order: i32,
    pub is_published: bool,
}

impl NewContentRecord {
    #[must_use]
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            class_id: item.class_id(),
            title: item.title().to_owned(),
            week_number: item.week_number(),
            order: item.order(),
            is_published: item.is_published(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewEnrollmentRecord {
    pub class_id: ClassId,
    pub member_id: MemberId,
    pub enrolled_at: DateTime<Utc>,
}

/// Repository contract for classes and their generated sessions.
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Persist a class and its session plan as one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a class with the same creation key
    /// already exists, or other storage errors.
    async fn insert_class_with_sessions(
        &self,
        class: NewClassRecord,
        plan: &[SessionPlanEntry],
    ) -> Result<ClassId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_creation_key(&self, key: CreationKey) -> Result<Option<Class>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_class(&self, id: ClassId) -> Result<Option<Class>, StorageError>;

    /// Sessions for a class ordered by date.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_sessions(&self, class_id: ClassId) -> Result<Vec<ClassSession>, StorageError>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the class does not exist, or other
    /// storage errors.
    async fn insert_content(&self, item: NewContentRecord) -> Result<ContentId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the item does not exist.
    async fn set_published(&self, id: ContentId, published: bool) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_content(&self, id: ContentId) -> Result<Option<ContentItem>, StorageError>;

    /// Every item of a class, published or not, in canonical order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_content(&self, class_id: ClassId) -> Result<Vec<ContentItem>, StorageError>;

    /// Published items of a class in canonical order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn published_content(&self, class_id: ClassId)
    -> Result<Vec<ContentItem>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the member is already enrolled in
    /// the class, `StorageError::NotFound` if the class is missing.
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollmentRecord,
    ) -> Result<EnrollmentId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_enrollments(&self, class_id: ClassId) -> Result<Vec<Enrollment>, StorageError>;

    /// Write status, metrics and attendance for an enrollment whose stored
    /// version still equals `enrollment.version()`. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the stored version moved on,
    /// `StorageError::NotFound` if the row is gone.
    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn completions_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<ContentCompletion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
    ) -> Result<Option<ContentCompletion>, StorageError>;

    /// Insert `record` unless a record for the pair already exists; returns
    /// whichever record is stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn start_completion(
        &self,
        record: &ContentCompletion,
    ) -> Result<ContentCompletion, StorageError>;
}

/// Atomic write of a completion toggle together with the recomputed
/// enrollment metrics.
#[async_trait]
pub trait ProgressPersistence: Send + Sync {
    /// Upsert `completion` and save `enrollment` in one transaction, guarded
    /// by the enrollment's version. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the completion does not belong to
    /// the enrollment or the enrollment changed concurrently; nothing is
    /// written in that case.
    async fn apply_completion(
        &self,
        enrollment: &Enrollment,
        completion: &ContentCompletion,
    ) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Insert or replace the record for `(session, enrollment)` and save
    /// `enrollment` (carrying the refreshed rate) in one transaction, guarded
    /// by the enrollment's version. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the record does not belong to the
    /// enrollment or the enrollment changed concurrently; nothing is written
    /// in that case.
    async fn apply_attendance(
        &self,
        enrollment: &Enrollment,
        record: &AttendanceRecord,
    ) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn attendance_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<AttendanceRecord>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    classes: HashMap<ClassId, Class>,
    sessions: HashMap<ClassId, Vec<ClassSession>>,
    content: HashMap<ContentId, ContentItem>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    completions: HashMap<(EnrollmentId, ContentId), ContentCompletion>,
    attendance: HashMap<(SessionId, EnrollmentId), AttendanceRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one mutex so multi-table writes are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn store_enrollment(
    state: &mut MemoryState,
    enrollment: &Enrollment,
) -> Result<u64, StorageError> {
    let stored = state
        .enrollments
        .get(&enrollment.id())
        .ok_or(StorageError::NotFound)?;
    if stored.version() != enrollment.version() {
        return Err(StorageError::Conflict);
    }

    let version = enrollment.version() + 1;
    let updated = Enrollment::from_persisted(
        enrollment.id(),
        enrollment.class_id(),
        enrollment.member_id(),
        enrollment.status(),
        enrollment.progress(),
        enrollment.attendance_rate(),
        version,
        enrollment.enrolled_at(),
        enrollment.completed_at(),
    )
    .map_err(|e| StorageError::Serialization(e.to_string()))?;
    state.enrollments.insert(enrollment.id(), updated);
    Ok(version)
}

#[async_trait]
impl ClassRepository for InMemoryRepository {
    async fn insert_class_with_sessions(
        &self,
        class: NewClassRecord,
        plan: &[SessionPlanEntry],
    ) -> Result<ClassId, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .classes
            .values()
            .any(|c| c.creation_key() == class.creation_key)
        {
            return Err(StorageError::Conflict);
        }

        let id = ClassId::new(self.allocate_id());
        let stored = Class::new(
            id,
            class.name,
            class.description,
            class.schedule,
            class.creation_key,
            class.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let sessions = plan
            .iter()
            .map(|entry| ClassSession::from_plan(SessionId::new(self.allocate_id()), id, entry))
            .collect();

        guard.classes.insert(id, stored);
        guard.sessions.insert(id, sessions);
        Ok(id)
    }

    async fn find_by_creation_key(&self, key: CreationKey) -> Result<Option<Class>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .classes
            .values()
            .find(|c| c.creation_key() == key)
            .cloned())
    }

    async fn get_class(&self, id: ClassId) -> Result<Option<Class>, StorageError> {
        Ok(self.lock()?.classes.get(&id).cloned())
    }

    async fn list_sessions(&self, class_id: ClassId) -> Result<Vec<ClassSession>, StorageError> {
        Ok(self
            .lock()?
            .sessions
            .get(&class_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn insert_content(&self, item: NewContentRecord) -> Result<ContentId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.classes.contains_key(&item.class_id) {
            return Err(StorageError::NotFound);
        }

        let id = ContentId::new(self.allocate_id());
        let stored = ContentItem::new(
            id,
            item.class_id,
            item.title,
            item.week_number,
            item.order,
            item.is_published,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.content.insert(id, stored);
        Ok(id)
    }

    async fn set_published(&self, id: ContentId, published: bool) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let item = guard.content.get_mut(&id).ok_or(StorageError::NotFound)?;
        *item = item.clone().published(published);
        Ok(())
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentItem>, StorageError> {
        Ok(self.lock()?.content.get(&id).cloned())
    }

    async fn list_content(&self, class_id: ClassId) -> Result<Vec<ContentItem>, StorageError> {
        let guard = self.lock()?;
        let mut items: Vec<ContentItem> = guard
            .content
            .values()
            .filter(|c| c.class_id() == class_id)
            .cloned()
            .collect();
        sort_canonical(&mut items);
        Ok(items)
    }

    async fn published_content(
        &self,
        class_id: ClassId,
    ) -> Result<Vec<ContentItem>, StorageError> {
        let mut items = self.list_content(class_id).await?;
        items.retain(ContentItem::is_published);
        Ok(items)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollmentRecord,
    ) -> Result<EnrollmentId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.classes.contains_key(&enrollment.class_id) {
            return Err(StorageError::NotFound);
        }
        if guard.enrollments.values().any(|e| {
            e.class_id() == enrollment.class_id && e.member_id() == enrollment.member_id
        }) {
            return Err(StorageError::Conflict);
        }

        let id = EnrollmentId::new(self.allocate_id());
        guard.enrollments.insert(
            id,
            Enrollment::new(
                id,
                enrollment.class_id,
                enrollment.member_id,
                enrollment.enrolled_at,
            ),
        );
        Ok(id)
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StorageError> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    async fn list_enrollments(&self, class_id: ClassId) -> Result<Vec<Enrollment>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Enrollment> = guard
            .enrollments
            .values()
            .filter(|e| e.class_id() == class_id)
            .cloned()
            .collect();
        out.sort_by_key(Enrollment::id);
        Ok(out)
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        store_enrollment(&mut guard, enrollment)
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn completions_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<ContentCompletion>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<ContentCompletion> = guard
            .completions
            .values()
            .filter(|c| c.enrollment_id() == enrollment_id)
            .cloned()
            .collect();
        out.sort_by_key(ContentCompletion::content_id);
        Ok(out)
    }

    async fn get_completion(
        &self,
        enrollment_id: EnrollmentId,
        content_id: ContentId,
    ) -> Result<Option<ContentCompletion>, StorageError> {
        Ok(self
            .lock()?
            .completions
            .get(&(enrollment_id, content_id))
            .cloned())
    }

    async fn start_completion(
        &self,
        record: &ContentCompletion,
    ) -> Result<ContentCompletion, StorageError> {
        let mut guard = self.lock()?;
        if !guard.enrollments.contains_key(&record.enrollment_id()) {
            return Err(StorageError::NotFound);
        }
        let stored = guard
            .completions
            .entry((record.enrollment_id(), record.content_id()))
            .or_insert_with(|| record.clone());
        Ok(stored.clone())
    }
}

#[async_trait]
impl ProgressPersistence for InMemoryRepository {
    async fn apply_completion(
        &self,
        enrollment: &Enrollment,
        completion: &ContentCompletion,
    ) -> Result<u64, StorageError> {
        if completion.enrollment_id() != enrollment.id() {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let version = store_enrollment(&mut guard, enrollment)?;
        guard.completions.insert(
            (completion.enrollment_id(), completion.content_id()),
            completion.clone(),
        );
        Ok(version)
    }
}

#[async_trait]
impl AttendanceRepository for InMemoryRepository {
    async fn apply_attendance(
        &self,
        enrollment: &Enrollment,
        record: &AttendanceRecord,
    ) -> Result<u64, StorageError> {
        if record.enrollment_id != enrollment.id() {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let version = store_enrollment(&mut guard, enrollment)?;
        guard
            .attendance
            .insert((record.session_id, record.enrollment_id), record.clone());
        Ok(version)
    }

    async fn attendance_for(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<AttendanceRecord> = guard
            .attendance
            .values()
            .filter(|r| r.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.session_id);
        Ok(out)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub classes: Arc<dyn ClassRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub completions: Arc<dyn CompletionRepository>,
    pub progress: Arc<dyn ProgressPersistence>,
    pub attendance: Arc<dyn AttendanceRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            classes: Arc::new(repo.clone()),
            content: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            completions: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            attendance: Arc::new(repo),
        }
    }
}
