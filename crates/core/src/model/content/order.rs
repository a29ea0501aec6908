use crate::model::content::ContentItem;

/// Sorts items in place by their canonical key.
pub fn sort_canonical(items: &mut [ContentItem]) {
    items.sort_by_key(ContentItem::canonical_key);
}

/// Published items only, in canonical order.
///
/// This is the list the progression engine walks.
#[must_use]
pub fn published_in_order(items: impl IntoIterator<Item = ContentItem>) -> Vec<ContentItem> {
    let mut published: Vec<ContentItem> =
        items.into_iter().filter(ContentItem::is_published).collect();
    sort_canonical(&mut published);
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassId, ContentId};

    fn item(id: u64, week: Option<u32>, order: i32, published: bool) -> ContentItem {
        ContentItem::new(
            ContentId::new(id),
            ClassId::new(1),
            format!("Lesson {id}"),
            week,
            order,
            published,
        )
        .unwrap()
    }

    #[test]
    fn orders_by_week_then_order_then_id() {
        let items = vec![
            item(10, Some(2), 0, true),
            item(4, Some(1), 1, true),
            item(3, Some(1), 1, true),
            item(7, None, 5, true),
            item(2, Some(1), 0, true),
        ];

        let ids: Vec<u64> = published_in_order(items)
            .iter()
            .map(|i| i.id().value())
            .collect();
        assert_eq!(ids, vec![7, 2, 3, 4, 10]);
    }

    #[test]
    fn drops_unpublished_items() {
        let items = vec![item(1, Some(1), 0, true), item(2, Some(1), 1, false)];
        let published = published_in_order(items);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id(), ContentId::new(1));
    }

    #[test]
    fn ordering_is_independent_of_input_order() {
        let forward = vec![item(1, Some(1), 0, true), item(2, Some(1), 0, true)];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(published_in_order(forward), published_in_order(backward));
    }
}
