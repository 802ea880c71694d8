use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::Databank;
use crate::errors::StoreError;

/// Redis-backed databank. Records are plain string keys namespaced as
/// `<prefix>:<table>:<key>`, lists are Redis lists.
#[derive(Clone)]
pub struct RedisBank {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisBank {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, "dialback"))
    }

    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn record_key(&self, table: &str, key: &str) -> String {
        format!("{}:{}:{}", self.prefix, table, key)
    }

    fn list_key(&self, list: &str) -> String {
        format!("{}:{}", self.prefix, list)
    }
}

#[async_trait]
impl Databank for RedisBank {
    async fn create(&self, table: &str, key: &str, value: String) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // SETNX is atomic, so concurrent creates of the same key yield one winner.
        let inserted: bool = conn.set_nx(self.record_key(table, key), value).await?;
        if inserted {
            Ok(())
        } else {
            Err(StoreError::Duplicate(key.to_string()))
        }
    }

    async fn read(&self, table: &str, key: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.record_key(table, key)).await?;
        value.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, table: &str, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.record_key(table, key)).await?;
        if removed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn append(&self, list: &str, item: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(self.list_key(list), item).await?;
        Ok(())
    }

    async fn read_list(&self, list: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(self.list_key(list), 0, -1).await?;
        Ok(items)
    }

    async fn remove_from_list(&self, list: &str, item: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(self.list_key(list), 1, item).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Requires Redis at REDIS_URL (default redis://127.0.0.1:6379).
    #[tokio::test]
    #[ignore]
    async fn test_redis_bank_create_read_delete() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let client = redis::Client::open(url.as_str()).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let prefix = format!("dialback-test-{}", uuid::Uuid::new_v4().simple());
        let bank = RedisBank::new(conn, prefix);

        bank.create("t", "k", "v".into()).await.unwrap();
        assert!(matches!(
            bank.create("t", "k", "w".into()).await,
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(bank.read("t", "k").await.unwrap(), "v");

        bank.append("l", "k").await.unwrap();
        assert_eq!(bank.read_list("l").await.unwrap(), vec!["k".to_string()]);
        bank.remove_from_list("l", "k").await.unwrap();
        assert!(bank.read_list("l").await.unwrap().is_empty());

        bank.delete("t", "k").await.unwrap();
        assert!(bank.read("t", "k").await.unwrap_err().is_not_found());
    }
}
