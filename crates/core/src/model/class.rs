use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ClassId, CreationKey};
use crate::model::schedule::ClassSchedule;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassError {
    #[error("class name cannot be empty")]
    EmptyName,
}

/// A discipleship class: a named course with a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    id: ClassId,
    name: String,
    description: Option<String>,
    schedule: ClassSchedule,
    creation_key: CreationKey,
    created_at: DateTime<Utc>,
}

impl Class {
    /// Creates a new class.
    ///
    /// # Errors
    ///
    /// Returns `ClassError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: ClassId,
        name: impl Into<String>,
        description: Option<String>,
        schedule: ClassSchedule,
        creation_key: CreationKey,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ClassError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClassError::EmptyName);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            description,
            schedule,
            creation_key,
            created_at,
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: ClassId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn id(&self) -> ClassId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn schedule(&self) -> &ClassSchedule {
        &self.schedule
    }

    #[must_use]
    pub fn creation_key(&self) -> CreationKey {
        self.creation_key
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
