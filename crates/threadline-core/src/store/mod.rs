pub mod history_storage;
pub mod kv;
pub mod pending;

pub use history_storage::{HistoryStorage, StorageBackend};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use pending::PendingTransfer;
