use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::ids::{ClassId, SessionId};

/// One generated occurrence of a recurring class meeting, before persistence.
///
/// `sequence_number` is the 1-based creation order. It is not a business key;
/// persisted sessions get their own `SessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlanEntry {
    pub session_date: NaiveDate,
    pub sequence_number: u32,
    pub topic: Option<String>,
    pub notes: Option<String>,
}

impl SessionPlanEntry {
    #[must_use]
    pub fn new(session_date: NaiveDate, sequence_number: u32) -> Self {
        Self {
            session_date,
            sequence_number,
            topic: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// A session plan entry after it has been stored for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: SessionId,
    pub class_id: ClassId,
    pub session_date: NaiveDate,
    pub topic: Option<String>,
    pub notes: Option<String>,
}

impl ClassSession {
    #[must_use]
    pub fn from_plan(id: SessionId, class_id: ClassId, entry: &SessionPlanEntry) -> Self {
        Self {
            id,
            class_id,
            session_date: entry.session_date,
            topic: entry.topic.clone(),
            notes: entry.notes.clone(),
        }
    }

    /// Whether the meeting date is on or before `today`.
    #[must_use]
    pub fn has_been_held(&self, today: NaiveDate) -> bool {
        self.session_date <= today
    }
}
