//! Records of the dialback tokens this node has issued.
//!
//! Each record lives in the `dialbackrequest` table under its composite key
//! and is mirrored in the `recentdialbackrequests` list so the sweeper can
//! find expiry candidates without scanning the whole table.

use std::sync::Arc;

use super::Databank;
use crate::errors::StoreError;
use crate::models::record::{timestamp_of, TokenRecord};

pub const RECORD_TABLE: &str = "dialbackrequest";
pub const RECENT_INDEX: &str = "recentdialbackrequests";

#[derive(Clone)]
pub struct TokenStore {
    bank: Arc<dyn Databank>,
}

impl TokenStore {
    pub fn new(bank: Arc<dyn Databank>) -> Self {
        Self { bank }
    }

    /// Persist a freshly issued record and append its key to the recent index.
    pub async fn create(&self, record: TokenRecord) -> Result<TokenRecord, StoreError> {
        if !record.has_all_fields() {
            return Err(StoreError::InvalidRecord("Wrong properties".to_string()));
        }

        let key = record.key();
        let value = serde_json::to_string(&record).map_err(|e| StoreError::Backend(e.into()))?;
        self.bank.create(RECORD_TABLE, &key, value).await?;

        if let Err(e) = self.bank.append(RECENT_INDEX, &key).await {
            // An unindexed record would never be swept.
            if let Err(undo) = self.bank.delete(RECORD_TABLE, &key).await {
                tracing::error!(error = %undo, "failed to roll back unindexed dialback record");
            }
            return Err(e);
        }

        Ok(record)
    }

    pub async fn get(&self, key: &str) -> Result<TokenRecord, StoreError> {
        let raw = self.bank.read(RECORD_TABLE, key).await?;
        serde_json::from_str(&raw).map_err(|e| StoreError::Backend(e.into()))
    }

    /// `Ok(false)` for an unknown key; any other store failure is an error.
    pub async fn is_remembered(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Evict every indexed record with `now - timestamp > window_ms`.
    /// Keys whose timestamp cannot be read are evicted as well.
    /// Returns the number of index entries removed.
    pub async fn sweep(&self, now: i64, window_ms: i64) -> Result<usize, StoreError> {
        let keys = self.bank.read_list(RECENT_INDEX).await?;
        let expired = keys.into_iter().filter(|key| match timestamp_of(key) {
            Some(ts) => now - ts > window_ms,
            None => true,
        });

        let mut evicted = 0;
        for key in expired {
            // Record first: if the index removal then fails, the next pass
            // retries and finds the record already gone.
            match self.bank.delete(RECORD_TABLE, &key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            self.bank.remove_from_list(RECENT_INDEX, &key).await?;
            evicted += 1;
        }

        Ok(evicted)
    }
}
