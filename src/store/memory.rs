use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::Databank;
use crate::errors::StoreError;

/// In-process databank. Records live in a DashMap keyed by (table, key);
/// lists sit behind a plain mutex that is never held across an await.
#[derive(Default)]
pub struct MemoryBank {
    records: DashMap<(String, String), String>,
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all tables (for tests / debugging).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lists(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<String>>>, StoreError> {
        self.lists
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("list index lock poisoned")))
    }
}

#[async_trait]
impl Databank for MemoryBank {
    async fn create(&self, table: &str, key: &str, value: String) -> Result<(), StoreError> {
        match self.records.entry((table.to_string(), key.to_string())) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn read(&self, table: &str, key: &str) -> Result<String, StoreError> {
        self.records
            .get(&(table.to_string(), key.to_string()))
            .map(|v| v.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, table: &str, key: &str) -> Result<(), StoreError> {
        self.records
            .remove(&(table.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn append(&self, list: &str, item: &str) -> Result<(), StoreError> {
        self.lists()?
            .entry(list.to_string())
            .or_default()
            .push(item.to_string());
        Ok(())
    }

    async fn read_list(&self, list: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.lists()?.get(list).cloned().unwrap_or_default())
    }

    async fn remove_from_list(&self, list: &str, item: &str) -> Result<(), StoreError> {
        if let Some(items) = self.lists()?.get_mut(list) {
            if let Some(pos) = items.iter().position(|i| i == item) {
                items.remove(pos);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_duplicate_and_keeps_original() {
        let bank = MemoryBank::new();
        bank.create("t", "k", "first".into()).await.unwrap();
        let err = bank.create("t", "k", "second".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(bank.read("t", "k").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_tables_are_separate() {
        let bank = MemoryBank::new();
        bank.create("a", "k", "1".into()).await.unwrap();
        bank.create("b", "k", "2".into()).await.unwrap();
        assert_eq!(bank.read("a", "k").await.unwrap(), "1");
        assert_eq!(bank.read("b", "k").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_read_and_delete_missing_are_not_found() {
        let bank = MemoryBank::new();
        assert!(bank.read("t", "nope").await.unwrap_err().is_not_found());
        assert!(bank.delete("t", "nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_append_and_remove() {
        let bank = MemoryBank::new();
        bank.append("l", "x").await.unwrap();
        bank.append("l", "y").await.unwrap();
        bank.remove_from_list("l", "x").await.unwrap();
        bank.remove_from_list("l", "absent").await.unwrap();
        assert_eq!(bank.read_list("l").await.unwrap(), vec!["y".to_string()]);
        assert!(bank.read_list("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_same_key_one_wins() {
        let bank = std::sync::Arc::new(MemoryBank::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let bank = bank.clone();
            handles.push(tokio::spawn(async move {
                bank.create("t", "same", i.to_string()).await.is_ok()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
