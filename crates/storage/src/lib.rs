pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryRepository, Storage, StorageError};
