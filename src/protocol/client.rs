//! Outbound dialback client: issues a token, remembers it, then makes the
//! authenticated POST. No retries; a failed call must be reissued from
//! scratch with a fresh token.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::StatusCode;

use super::authorization::DialbackCredentials;
use super::date::format_http_date;
use crate::clock::Clock;
use crate::errors::DialbackError;
use crate::models::record::truncate_to_second;
use crate::models::{Identity, TokenRecord};
use crate::store::TokenStore;

/// Random bytes per token before encoding.
pub const TOKEN_BYTES: usize = 16;

pub fn default_user_agent() -> String {
    format!("dialback-client/{}", env!("CARGO_PKG_VERSION"))
}

/// Generate an opaque token: URL-safe base64 of [`TOKEN_BYTES`] random bytes.
/// The alphabet contains no `/`, so tokens never split a composite key.
pub fn generate_token() -> Result<String, DialbackError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| DialbackError::TokenGeneration(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Raw result of an outbound POST; the body is returned unparsed.
#[derive(Debug, Clone)]
pub struct DialbackResponse {
    pub status: StatusCode,
    pub body: String,
}

pub struct DialbackClient {
    store: TokenStore,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
}

impl DialbackClient {
    pub fn new(
        store: TokenStore,
        clock: Arc<dyn Clock>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DialbackError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { store, clock, http })
    }

    /// POST `body` to `endpoint` as `id`, authenticated with a fresh token.
    pub async fn post(
        &self,
        endpoint: &str,
        id: &str,
        body: impl Into<String>,
        content_type: &str,
    ) -> Result<DialbackResponse, DialbackError> {
        url::Url::parse(endpoint).map_err(|e| {
            DialbackError::ProtocolViolation(format!("invalid endpoint {}: {}", endpoint, e))
        })?;
        let token = generate_token()?;
        let timestamp = truncate_to_second(self.clock.now_ms());

        let record = self
            .store
            .create(TokenRecord::new(endpoint, id, token.as_str(), timestamp))
            .await?;
        tracing::debug!(endpoint = %endpoint, id = %id, timestamp, "remembered dialback token");

        let headers = request_headers(&record, content_type)?;
        let body = body.into();
        let resp = self
            .http
            .post(endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("dialback POST to {} failed: {}", endpoint, e);
                DialbackError::Transport(e.to_string())
            })?;

        let status = resp.status();
        let body = resp.text().await?;
        Ok(DialbackResponse { status, body })
    }
}

/// `Authorization` and `Date` headers for a remembered record. The date is
/// the stored timestamp, not the send time, so the receiver's callback
/// reproduces the exact key.
fn request_headers(record: &TokenRecord, content_type: &str) -> Result<HeaderMap, DialbackError> {
    let creds = DialbackCredentials::new(&Identity::parse(&record.id), &record.token);
    let date = format_http_date(record.timestamp).ok_or_else(|| {
        DialbackError::ProtocolViolation(format!("timestamp out of range: {}", record.timestamp))
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, header_value(&creds.to_header_value())?);
    headers.insert(DATE, header_value(&date)?);
    headers.insert(CONTENT_TYPE, header_value(content_type)?);
    Ok(headers)
}

fn header_value(raw: &str) -> Result<HeaderValue, DialbackError> {
    HeaderValue::from_str(raw)
        .map_err(|e| DialbackError::ProtocolViolation(format!("invalid header value: {}", e)))
}
