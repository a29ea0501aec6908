mod item;
mod order;

pub use item::{ContentError, ContentItem};
pub use order::{published_in_order, sort_canonical};
