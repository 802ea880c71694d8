use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of the token storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("no such record: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum DialbackError {
    /// Malformed or missing field. Always the caller's fault.
    #[error("{0}")]
    ProtocolViolation(String),

    /// Timestamp outside the replay window.
    #[error("{0}")]
    ReplayRejected(String),

    /// Well-formed query for a token this node never issued.
    #[error("Not my token")]
    NotRecognized,

    #[error("{0}")]
    Discovery(String),

    #[error("{0}")]
    Transport(String),

    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for DialbackError {
    fn from(e: reqwest::Error) -> Self {
        DialbackError::Transport(e.to_string())
    }
}

impl IntoResponse for DialbackError {
    fn into_response(self) -> Response {
        match &self {
            DialbackError::ProtocolViolation(reason) | DialbackError::ReplayRejected(reason) => {
                plain_text(StatusCode::BAD_REQUEST, reason.clone())
            }
            DialbackError::NotRecognized => plain_text(StatusCode::BAD_REQUEST, self.to_string()),
            DialbackError::Discovery(reason) | DialbackError::Transport(reason) => {
                unauthorized(reason)
            }
            DialbackError::TokenGeneration(_) | DialbackError::Store(_) => {
                tracing::error!("dialback internal error: {}", self);
                plain_text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        }
    }
}

/// 401 carrying the `WWW-Authentication: Dialback` challenge.
pub fn unauthorized(reason: &str) -> Response {
    let mut response = plain_text(StatusCode::UNAUTHORIZED, reason.to_string());
    response.headers_mut().insert(
        "www-authentication",
        HeaderValue::from_static("Dialback"),
    );
    response
}

fn plain_text(status: StatusCode, body: String) -> Response {
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
