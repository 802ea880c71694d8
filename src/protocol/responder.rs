//! Callback responder: answers "did you issue this token?" for tokens this
//! node handed out through [`DialbackClient`](super::client::DialbackClient).

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use super::date::parse_date;
use super::REPLAY_WINDOW_MS;
use crate::clock::Clock;
use crate::errors::DialbackError;
use crate::models::record::to_key;
use crate::models::Identity;
use crate::store::TokenStore;

/// Form body of a callback query. Empty values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub host: Option<String>,
    pub webfinger: Option<String>,
    pub token: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

pub struct Responder {
    hostname: String,
    store: TokenStore,
    clock: Arc<dyn Clock>,
}

impl Responder {
    pub fn new(hostname: impl Into<String>, store: TokenStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            hostname: hostname.into(),
            store,
            clock,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Checks run in order and the first failure wins.
    pub async fn confirm(&self, query: &CallbackQuery) -> Result<(), DialbackError> {
        let identity = self.claimed_identity(query)?;

        let token = present(&query.token)
            .ok_or_else(|| DialbackError::ProtocolViolation("No token".into()))?;

        let ts = present(&query.date)
            .and_then(parse_date)
            .ok_or_else(|| DialbackError::ProtocolViolation("No date".into()))?;

        // Replay window against our own wall clock; peer clock skew is not
        // compensated.
        if (self.clock.now_ms() - ts).abs() > REPLAY_WINDOW_MS {
            return Err(DialbackError::ReplayRejected("Invalid date".into()));
        }

        let url = query.url.as_deref().unwrap_or_default();
        let key = to_key(url, identity.as_str(), token, ts);
        if self.store.is_remembered(&key).await? {
            Ok(())
        } else {
            Err(DialbackError::NotRecognized)
        }
    }

    fn claimed_identity(&self, query: &CallbackQuery) -> Result<Identity, DialbackError> {
        let identity = if let Some(host) = present(&query.host) {
            Identity::Host(host.to_string())
        } else if let Some(webfinger) = present(&query.webfinger) {
            Identity::Webfinger(webfinger.to_string())
        } else {
            return Err(DialbackError::ProtocolViolation("No identity".into()));
        };

        match identity.domain() {
            Some(domain) if domain == self.hostname => Ok(identity),
            _ => Err(DialbackError::ProtocolViolation("Incorrect host".into())),
        }
    }
}

/// Undecodable bodies (wrong content type, repeated fields) are answered with
/// a protocol 400 rather than the extractor's own status.
pub async fn dialback_handler(
    State(responder): State<Arc<Responder>>,
    query: Result<Form<CallbackQuery>, FormRejection>,
) -> Response {
    let Form(query) = match query {
        Ok(form) => form,
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "undecodable dialback query");
            return DialbackError::ProtocolViolation("Malformed query".into()).into_response();
        }
    };
    match responder.confirm(&query).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::debug!(reason = %e, "dialback query rejected");
            e.into_response()
        }
    }
}

/// Router exposing the responder at `path` (conventionally `/dialback`).
pub fn router<S>(responder: Arc<Responder>, path: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(path, post(dialback_handler))
        .with_state(responder)
}
