use serde::{Deserialize, Serialize};

/// One issued, outstanding dialback token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// URL of the resource the token was presented to.
    pub endpoint: String,
    /// Hostname or `account@domain` address that presented the token.
    pub id: String,
    pub token: String,
    /// Issuance time in epoch milliseconds, truncated to whole seconds.
    pub timestamp: i64,
}

impl TokenRecord {
    pub fn new(
        endpoint: impl Into<String>,
        id: impl Into<String>,
        token: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            id: id.into(),
            token: token.into(),
            timestamp,
        }
    }

    /// `endpoint/id/token/timestamp`
    pub fn key(&self) -> String {
        to_key(&self.endpoint, &self.id, &self.token, self.timestamp)
    }

    pub fn has_all_fields(&self) -> bool {
        !self.endpoint.is_empty() && !self.id.is_empty() && !self.token.is_empty()
    }
}

pub fn to_key(endpoint: &str, id: &str, token: &str, timestamp: i64) -> String {
    format!("{}/{}/{}/{}", endpoint, id, token, timestamp)
}

/// Timestamp embedded in a composite key. The endpoint itself contains
/// slashes, so only the last segment is reliable.
pub fn timestamp_of(key: &str) -> Option<i64> {
    key.rsplit('/').next()?.parse().ok()
}

/// Round an epoch-millisecond instant down to whole seconds.
pub fn truncate_to_second(ms: i64) -> i64 {
    ms.div_euclid(1000) * 1000
}
