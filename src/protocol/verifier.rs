//! Inbound verifier middleware.
//!
//! Workflow for a request carrying `Authorization: Dialback ...`:
//! 1. Parse the credential and check the `Date` header against the replay window
//! 2. Rebuild the request URL the caller would have recorded as its endpoint,
//!    from this node's configured public authority. The inbound `Host` header
//!    is caller-controlled and never used: a peer holding someone else's token
//!    could otherwise relay it here under its own name.
//! 3. Discover the claimed identity's dialback endpoint
//! 4. POST `{host|webfinger, token, date, url, ...}` there; 2xx confirms
//!
//! Confirmed identities are attached to the request as [`RemoteIdentity`].

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{OriginalUri, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use super::authorization::{AuthorizationError, DialbackCredentials};
use super::date::parse_date;
use super::REPLAY_WINDOW_MS;
use crate::clock::Clock;
use crate::discovery::Discovery;
use crate::errors::{unauthorized, DialbackError};
use crate::models::Identity;

/// Identity confirmed by a dialback round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteIdentity {
    /// Confirmed via `host=`.
    Host(String),
    /// Confirmed via `webfinger=`.
    User(String),
}

impl RemoteIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteIdentity::Host(h) => h,
            RemoteIdentity::User(u) => u,
        }
    }
}

impl From<Identity> for RemoteIdentity {
    fn from(identity: Identity) -> Self {
        match identity {
            Identity::Host(h) => RemoteIdentity::Host(h),
            Identity::Webfinger(w) => RemoteIdentity::User(w),
        }
    }
}

fn rejected(reason: &str) -> DialbackError {
    DialbackError::ProtocolViolation(reason.to_string())
}

pub struct Verifier {
    discovery: Arc<dyn Discovery>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    public_scheme: String,
    public_authority: String,
}

impl Verifier {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        clock: Arc<dyn Clock>,
        public_scheme: impl Into<String>,
        public_authority: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DialbackError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            discovery,
            http,
            clock,
            public_scheme: public_scheme.into(),
            public_authority: public_authority.into(),
        })
    }

    /// Confirm the caller's claimed identity. `path` is the request path as
    /// received, before any router nesting stripped a prefix.
    pub async fn verify(
        &self,
        headers: &HeaderMap,
        path: &str,
    ) -> Result<RemoteIdentity, DialbackError> {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| rejected("Dialback authorization required"))?;

        let creds = DialbackCredentials::parse(auth).map_err(|e| match e {
            AuthorizationError::WrongScheme => rejected("Dialback authorization required"),
            AuthorizationError::Malformed(_) => rejected(&e.to_string()),
        })?;

        let token = creds
            .token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| rejected("No token"))?;
        let identity = creds.identity().ok_or_else(|| rejected("No ID"))?;

        let date = headers
            .get(header::DATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| rejected("No Date"))?;
        let ts = parse_date(date).ok_or_else(|| rejected("Invalid Date"))?;
        if (ts - self.clock.now_ms()).abs() > REPLAY_WINDOW_MS {
            return Err(DialbackError::ReplayRejected("Date is too old".into()));
        }

        if let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
            if !host.eq_ignore_ascii_case(&self.public_authority) {
                tracing::debug!(host = %host, authority = %self.public_authority, "Host header differs from public authority");
            }
        }
        let url = format!("{}://{}{}", self.public_scheme, self.public_authority, path);

        let endpoint = self.discovery.discover(&identity).await?;

        let mut fields: Vec<(&str, &str)> = creds
            .params()
            .iter()
            .filter(|(k, _)| k != "date" && k != "url" && k != "token")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.push(("token", token));
        fields.push(("date", date));
        fields.push(("url", url.as_str()));

        tracing::debug!(identity = %identity, endpoint = %endpoint, url = %url, "confirming dialback claim");
        let resp = self
            .http
            .post(&endpoint)
            .form(&fields)
            .send()
            .await
            .map_err(|e| DialbackError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DialbackError::Transport(format!(
                "Error {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(identity.into())
    }
}

/// Middleware: rejects with 401 + `WWW-Authentication: Dialback` unless the
/// caller's identity is confirmed.
pub async fn dialback_auth(
    State(verifier): State<Arc<Verifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    match verifier.verify(req.headers(), &path).await {
        Ok(identity) => {
            tracing::info!(remote = %identity.as_str(), "dialback identity confirmed");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(reason = %e, path = %path, "dialback authentication failed");
            unauthorized(&e.to_string())
        }
    }
}
