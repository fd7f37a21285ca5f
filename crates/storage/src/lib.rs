pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryKeyValueStore, KeyValueStore, Storage, StorageError};
pub use sqlite::{SqliteInitError, SqliteKeyValueStore};
