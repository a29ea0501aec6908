use std::sync::Arc;

use disciple_core::model::{ClassId, ContentId, ContentItem};
use storage::repository::{ClassRepository, ContentRepository, NewContentRecord, StorageError};
use tracing::info;

use crate::error::ContentServiceError;

/// Manages the lesson catalogue of a class.
#[derive(Clone)]
pub struct ContentService {
    classes: Arc<dyn ClassRepository>,
    content: Arc<dyn ContentRepository>,
}

impl ContentService {
    #[must_use]
    pub fn new(classes: Arc<dyn ClassRepository>, content: Arc<dyn ContentRepository>) -> Self {
        Self { classes, content }
    }

    /// Add a lesson to a class.
    ///
    /// Changing the published set does not touch cached enrollment metrics;
    /// call `ProgressService::recalculate_metrics` for affected enrollments.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Content` for validation failures and
    /// `ContentServiceError::ClassNotFound` if the class does not exist.
    pub async fn add_content(
        &self,
        class_id: ClassId,
        title: impl Into<String>,
        week_number: Option<u32>,
        order: i32,
        is_published: bool,
    ) -> Result<ContentItem, ContentServiceError> {
        if self.classes.get_class(class_id).await?.is_none() {
            return Err(ContentServiceError::ClassNotFound(class_id));
        }

        let draft = ContentItem::new(
            ContentId::new(0),
            class_id,
            title,
            week_number,
            order,
            is_published,
        )?;
        let id = match self
            .content
            .insert_content(NewContentRecord::from_item(&draft))
            .await
        {
            Ok(id) => id,
            Err(StorageError::NotFound) => return Err(ContentServiceError::ClassNotFound(class_id)),
            Err(other) => return Err(other.into()),
        };

        info!(%class_id, content_id = %id, published = is_published, "content added");
        Ok(draft.with_id(id))
    }

    /// # Errors
    ///
    /// Returns `ContentServiceError::NotFound` if the item does not exist.
    pub async fn set_published(
        &self,
        id: ContentId,
        published: bool,
    ) -> Result<(), ContentServiceError> {
        match self.content.set_published(id, published).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(ContentServiceError::NotFound(id)),
            Err(other) => Err(other.into()),
        }
    }

    /// All lessons of a class in canonical order, including drafts.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Storage` if repository access fails.
    pub async fn list_content(
        &self,
        class_id: ClassId,
    ) -> Result<Vec<ContentItem>, ContentServiceError> {
        Ok(self.content.list_content(class_id).await?)
    }

    /// Published lessons of a class in canonical order.
    ///
    /// # Errors
    ///
    /// Returns `ContentServiceError::Storage` if repository access fails.
    pub async fn published_content(
        &self,
        class_id: ClassId,
    ) -> Result<Vec<ContentItem>, ContentServiceError> {
        Ok(self.content.published_content(class_id).await?)
    }
}
