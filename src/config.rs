use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::protocol::client::default_user_agent;
use crate::protocol::DEFAULT_PATH;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hostname this node answers dialback queries for.
    pub hostname: String,
    pub port: u16,
    /// Path of the callback responder.
    pub dialback_path: String,
    pub sweep_interval_ms: u64,
    pub store: StoreBackend,
    pub redis_url: String,
    /// Timeout applied to every outbound call (issuance, discovery, confirmation).
    pub http_timeout_secs: u64,
    /// Scheme used for host-meta / webfinger lookups.
    pub discovery_scheme: String,
    /// Scheme used when rebuilding the URL of an inbound request.
    pub public_scheme: String,
    /// `host[:port]` peers use to reach this node; the authority part of
    /// every rebuilt inbound URL. Defaults to `hostname`.
    pub public_authority: String,
    pub user_agent: String,
}

impl Config {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Whether tokens issued by a separate `post` process are visible to a
    /// `serve` process running with this config.
    pub fn shares_issued_tokens(&self) -> bool {
        self.store == StoreBackend::Redis
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary variable source.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let hostname = lookup("DIALBACK_HOSTNAME")
        .filter(|h| !h.trim().is_empty())
        .context("DIALBACK_HOSTNAME must be set to the hostname this node answers for")?;

    let store = match lookup("DIALBACK_STORE").as_deref().unwrap_or("memory") {
        "memory" => StoreBackend::Memory,
        "redis" => StoreBackend::Redis,
        other => anyhow::bail!("Invalid DIALBACK_STORE: {}. Must be 'memory' or 'redis'", other),
    };

    let mut dialback_path = lookup("DIALBACK_PATH").unwrap_or_else(|| DEFAULT_PATH.into());
    if !dialback_path.starts_with('/') {
        dialback_path.insert(0, '/');
    }

    let hostname = hostname.trim().to_string();
    let public_authority = lookup("DIALBACK_PUBLIC_AUTHORITY")
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| hostname.clone());

    Ok(Config {
        hostname,
        port: lookup("DIALBACK_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        dialback_path,
        sweep_interval_ms: lookup("DIALBACK_SWEEP_INTERVAL_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(60_000),
        store,
        redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
        http_timeout_secs: lookup("DIALBACK_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        discovery_scheme: lookup("DIALBACK_DISCOVERY_SCHEME").unwrap_or_else(|| "https".into()),
        public_scheme: lookup("DIALBACK_PUBLIC_SCHEME").unwrap_or_else(|| "http".into()),
        public_authority,
        user_agent: lookup("DIALBACK_USER_AGENT").unwrap_or_else(default_user_agent),
    })
}
