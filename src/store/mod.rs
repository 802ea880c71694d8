pub mod memory;
pub mod redis;
pub mod tokens;

use async_trait::async_trait;

use crate::errors::StoreError;

pub use memory::MemoryBank;
pub use self::redis::RedisBank;
pub use tokens::TokenStore;

/// Generic keyed storage with append-only lists.
/// Implementations: MemoryBank (DashMap, in-process), RedisBank.
#[async_trait]
pub trait Databank: Send + Sync {
    /// Insert `value` under `key`. Fails with `StoreError::Duplicate` if the
    /// key is already present; the existing value is left untouched.
    async fn create(&self, table: &str, key: &str, value: String) -> Result<(), StoreError>;

    /// Exact lookup. Fails with `StoreError::NotFound` when absent.
    async fn read(&self, table: &str, key: &str) -> Result<String, StoreError>;

    /// Fails with `StoreError::NotFound` when absent.
    async fn delete(&self, table: &str, key: &str) -> Result<(), StoreError>;

    async fn append(&self, list: &str, item: &str) -> Result<(), StoreError>;

    /// Snapshot of the list, oldest first.
    async fn read_list(&self, list: &str) -> Result<Vec<String>, StoreError>;

    /// Removes one occurrence of `item`. Absent items are not an error.
    async fn remove_from_list(&self, list: &str, item: &str) -> Result<(), StoreError>;
}
