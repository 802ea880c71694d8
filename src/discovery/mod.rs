//! Discovery of a claimed identity's dialback confirmation URL.
//!
//! Hosts publish a `rel="dialback"` link in their host-meta JRD; accounts
//! publish one in their webfinger (lrdd) JRD.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::DialbackError;
use crate::models::Identity;

pub const DIALBACK_REL: &str = "dialback";

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn resolve_host_endpoint(&self, host: &str) -> Result<String, DialbackError>;

    async fn resolve_address_endpoint(&self, address: &str) -> Result<String, DialbackError>;

    async fn discover(&self, identity: &Identity) -> Result<String, DialbackError> {
        match identity {
            Identity::Host(host) => self.resolve_host_endpoint(host).await,
            Identity::Webfinger(address) => self.resolve_address_endpoint(address).await,
        }
    }
}

/// JSON Resource Descriptor (subset of fields we need).
#[derive(Debug, Deserialize)]
pub struct Jrd {
    pub links: Option<Vec<JrdLink>>,
}

#[derive(Debug, Deserialize)]
pub struct JrdLink {
    pub rel: Option<String>,
    pub href: Option<String>,
}

impl Jrd {
    /// First `rel="dialback"` link that carries an href.
    pub fn dialback_href(&self) -> Option<&str> {
        self.links
            .as_deref()?
            .iter()
            .find(|l| l.rel.as_deref() == Some(DIALBACK_REL) && l.href.is_some())
            .and_then(|l| l.href.as_deref())
    }
}

/// Discovery over HTTP: `/.well-known/host-meta.json` for hosts,
/// `/.well-known/webfinger?resource=acct:...` for addresses.
#[derive(Clone)]
pub struct WebfingerDiscovery {
    http: reqwest::Client,
    scheme: String,
}

impl WebfingerDiscovery {
    pub fn new(scheme: impl Into<String>, timeout: Duration) -> Result<Self, DialbackError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(http, scheme))
    }

    pub fn with_client(http: reqwest::Client, scheme: impl Into<String>) -> Self {
        Self {
            http,
            scheme: scheme.into(),
        }
    }

    async fn fetch_jrd(&self, url: &str, query: &[(&str, String)]) -> Result<Jrd, DialbackError> {
        tracing::debug!(url = %url, "fetching discovery document");
        let resp = self
            .http
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/jrd+json, application/json")
            .send()
            .await
            .map_err(|e| DialbackError::Discovery(format!("discovery request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DialbackError::Discovery(format!(
                "discovery request to {} returned {}",
                url, status
            )));
        }

        resp.json::<Jrd>()
            .await
            .map_err(|e| DialbackError::Discovery(format!("invalid discovery document at {}: {}", url, e)))
    }
}

#[async_trait]
impl Discovery for WebfingerDiscovery {
    async fn resolve_host_endpoint(&self, host: &str) -> Result<String, DialbackError> {
        let url = format!("{}://{}/.well-known/host-meta.json", self.scheme, host);
        let jrd = self.fetch_jrd(&url, &[]).await?;

        if jrd.links.is_none() {
            return Err(DialbackError::Discovery(format!("No links in host-meta for {}", host)));
        }
        jrd.dialback_href().map(String::from).ok_or_else(|| {
            DialbackError::Discovery(format!("No dialback links in host-meta for {}", host))
        })
    }

    async fn resolve_address_endpoint(&self, address: &str) -> Result<String, DialbackError> {
        let domain = Identity::Webfinger(address.to_string())
            .domain()
            .map(String::from)
            .ok_or_else(|| DialbackError::Discovery(format!("Invalid address {}", address)))?;

        let url = format!("{}://{}/.well-known/webfinger", self.scheme, domain);
        let jrd = self
            .fetch_jrd(&url, &[("resource", format!("acct:{}", address))])
            .await?;

        if jrd.links.is_none() {
            return Err(DialbackError::Discovery(format!("No links in lrdd for {}", address)));
        }
        jrd.dialback_href().map(String::from).ok_or_else(|| {
            DialbackError::Discovery(format!("No dialback links in lrdd for {}", address))
        })
    }
}

/// Fixed identity → endpoint table, for peers known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    endpoints: HashMap<String, String>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identity: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(identity.into(), endpoint.into());
        self
    }

    fn lookup(&self, identity: &str) -> Result<String, DialbackError> {
        self.endpoints
            .get(identity)
            .cloned()
            .ok_or_else(|| DialbackError::Discovery(format!("No dialback links for {}", identity)))
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn resolve_host_endpoint(&self, host: &str) -> Result<String, DialbackError> {
        self.lookup(host)
    }

    async fn resolve_address_endpoint(&self, address: &str) -> Result<String, DialbackError> {
        self.lookup(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn discovery_for(server: &MockServer) -> (WebfingerDiscovery, String) {
        let host = server.uri().trim_start_matches("http://").to_string();
        (
            WebfingerDiscovery::new("http", Duration::from_secs(5)).unwrap(),
            host,
        )
    }

    #[tokio::test]
    async fn test_host_meta_dialback_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/host-meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": [
                    { "rel": "lrdd", "template": "https://a.example/lrdd?uri={uri}" },
                    { "rel": "dialback", "href": "https://a.example/dialback" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (discovery, host) = discovery_for(&server);
        let endpoint = discovery.resolve_host_endpoint(&host).await.unwrap();
        assert_eq!(endpoint, "https://a.example/dialback");
    }

    #[tokio::test]
    async fn test_host_meta_without_dialback_link_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/host-meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": [ { "rel": "lrdd" } ]
            })))
            .mount(&server)
            .await;

        let (discovery, host) = discovery_for(&server);
        let err = discovery.resolve_host_endpoint(&host).await.unwrap_err();
        assert_eq!(err.to_string(), format!("No dialback links in host-meta for {}", host));
    }

    #[tokio::test]
    async fn test_host_meta_without_links_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/host-meta.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let (discovery, host) = discovery_for(&server);
        let err = discovery.resolve_host_endpoint(&host).await.unwrap_err();
        assert_eq!(err.to_string(), format!("No links in host-meta for {}", host));
    }

    #[tokio::test]
    async fn test_webfinger_lookup_uses_acct_resource() {
        let server = MockServer::start().await;
        let (discovery, host) = discovery_for(&server);
        let address = format!("alice@{}", host);

        Mock::given(method("GET"))
            .and(path("/.well-known/webfinger"))
            .and(query_param("resource", format!("acct:{}", address)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subject": format!("acct:{}", address),
                "links": [ { "rel": "dialback", "href": "https://a.example/dialback" } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = discovery.resolve_address_endpoint(&address).await.unwrap();
        assert_eq!(endpoint, "https://a.example/dialback");
    }

    #[tokio::test]
    async fn test_webfinger_without_links_fails() {
        let server = MockServer::start().await;
        let (discovery, host) = discovery_for(&server);
        let address = format!("alice@{}", host);
        Mock::given(method("GET"))
            .and(path("/.well-known/webfinger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subject": format!("acct:{}", address)
            })))
            .mount(&server)
            .await;

        let err = discovery.resolve_address_endpoint(&address).await.unwrap_err();
        assert_eq!(err.to_string(), format!("No links in lrdd for {}", address));
    }

    #[tokio::test]
    async fn test_webfinger_without_dialback_link_fails() {
        let server = MockServer::start().await;
        let (discovery, host) = discovery_for(&server);
        let address = format!("alice@{}", host);
        Mock::given(method("GET"))
            .and(path("/.well-known/webfinger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": [
                    { "rel": "http://webfinger.net/rel/profile-page", "href": "https://a.example/alice" },
                    { "rel": "dialback" }
                ]
            })))
            .mount(&server)
            .await;

        let err = discovery.resolve_address_endpoint(&address).await.unwrap_err();
        assert_eq!(err.to_string(), format!("No dialback links in lrdd for {}", address));
    }

    #[tokio::test]
    async fn test_discovery_http_error_is_discovery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (discovery, host) = discovery_for(&server);
        let err = discovery
            .discover(&Identity::Host(host))
            .await
            .unwrap_err();
        assert!(matches!(err, DialbackError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_static_discovery() {
        let discovery = StaticDiscovery::new().with("a.example", "http://127.0.0.1:1/dialback");
        assert_eq!(
            discovery.discover(&Identity::parse("a.example")).await.unwrap(),
            "http://127.0.0.1:1/dialback"
        );
        assert!(discovery.discover(&Identity::parse("b.example")).await.is_err());
    }
}
