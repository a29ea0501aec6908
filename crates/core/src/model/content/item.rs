use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ClassId, ContentId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("content title cannot be empty")]
    EmptyTitle,

    #[error("week number must be >= 1 when set, got {0}")]
    InvalidWeekNumber(u32),
}

//
// ─── CONTENT ITEM ──────────────────────────────────────────────────────────────
//

/// A lesson (or other unit of material) owned by a class.
///
/// Members progress through published items in canonical order; see
/// [`ContentItem::canonical_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    id: ContentId,
    class_id: ClassId,
    title: String,
    week_number: Option<u32>,
    order: i32,
    is_published: bool,
}

impl ContentItem {
    /// Creates a content item.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::EmptyTitle` for a blank title and
    /// `ContentError::InvalidWeekNumber` for a week number of zero.
    pub fn new(
        id: ContentId,
        class_id: ClassId,
        title: impl Into<String>,
        week_number: Option<u32>,
        order: i32,
        is_published: bool,
    ) -> Result<Self, ContentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ContentError::EmptyTitle);
        }
        if week_number == Some(0) {
            return Err(ContentError::InvalidWeekNumber(0));
        }

        Ok(Self {
            id,
            class_id,
            title: title.trim().to_owned(),
            week_number,
            order,
            is_published,
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: ContentId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    #[must_use]
    pub fn id(&self) -> ContentId {
        self.id
    }

    #[must_use]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn week_number(&self) -> Option<u32> {
        self.week_number
    }

    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.is_published
    }

    /// Sort key `(week_number or 0, order, id)`.
    ///
    /// Items without a week sort before week 1. The id breaks ties so the
    /// order is total.
    #[must_use]
    pub fn canonical_key(&self) -> (u32, i32, ContentId) {
        (self.week_number.unwrap_or(0), self.order, self.id)
    }
}
