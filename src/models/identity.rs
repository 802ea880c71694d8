use serde::{Deserialize, Serialize};
use std::fmt;

/// A claimed identity: a bare hostname or an `account@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Host(String),
    Webfinger(String),
}

impl Identity {
    /// Classify a raw identity string: anything containing `@` is an address.
    pub fn parse(raw: &str) -> Self {
        if raw.contains('@') {
            Identity::Webfinger(raw.to_string())
        } else {
            Identity::Host(raw.to_string())
        }
    }

    /// Field name used on the wire (`host` or `webfinger`).
    pub fn field(&self) -> &'static str {
        match self {
            Identity::Host(_) => "host",
            Identity::Webfinger(_) => "webfinger",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identity::Host(h) => h,
            Identity::Webfinger(w) => w,
        }
    }

    /// Domain that is authoritative for this identity.
    pub fn domain(&self) -> Option<&str> {
        match self {
            Identity::Host(h) => Some(h),
            Identity::Webfinger(w) => match w.split_once('@') {
                Some((_, domain)) if !domain.contains('@') => Some(domain),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
