use disciple_core::model::{ClassId, ContentId, ContentItem};

use super::SqliteRepository;
use super::mapping::{conn, content_id_from_i64, id_to_i64, map_content_row, write_err};
use crate::repository::{ContentRepository, NewContentRecord, StorageError};

impl SqliteRepository {
    async fn content_for_class(
        &self,
        class_id: ClassId,
        published_only: bool,
    ) -> Result<Vec<ContentItem>, StorageError> {
        // Canonical order: items without a week first, then week, order, id.
        let rows = sqlx::query(
            r"
            SELECT id, class_id, title, week_number, display_order, is_published
            FROM content_items
            WHERE class_id = ?1
              AND (?2 = 0 OR is_published = 1)
            ORDER BY COALESCE(week_number, 0) ASC, display_order ASC, id ASC
            ",
        )
        .bind(id_to_i64("class_id", class_id.value())?)
        .bind(i64::from(published_only))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(map_content_row(&row)?);
        }
        Ok(items)
    }
}

#[async_trait::async_trait]
impl ContentRepository for SqliteRepository {
    async fn insert_content(&self, item: NewContentRecord) -> Result<ContentId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO content_items (class_id, title, week_number, display_order, is_published)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("class_id", item.class_id.value())?)
        .bind(item.title)
        .bind(item.week_number.map(i64::from))
        .bind(i64::from(item.order))
        .bind(i64::from(item.is_published))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        content_id_from_i64(res.last_insert_rowid())
    }

    async fn set_published(&self, id: ContentId, published: bool) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE content_items SET is_published = ?1 WHERE id = ?2")
            .bind(i64::from(published))
            .bind(id_to_i64("content_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentItem>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, class_id, title, week_number, display_order, is_published
            FROM content_items
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("content_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_content_row).transpose()
    }

    async fn list_content(&self, class_id: ClassId) -> Result<Vec<ContentItem>, StorageError> {
        self.content_for_class(class_id, false).await
    }

    async fn published_content(
        &self,
        class_id: ClassId,
    ) -> Result<Vec<ContentItem>, StorageError> {
        self.content_for_class(class_id, true).await
    }
}
