//! `Date` header handling. Outbound dates use the IMF-fixdate form of
//! HTTP-date; inbound dates are accepted as RFC 2822 or RFC 3339.

use chrono::{DateTime, Utc};

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format epoch milliseconds as an HTTP-date. Sub-second precision is lost.
pub fn format_http_date(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.format(HTTP_DATE).to_string())
}

/// Parse a date header value into epoch milliseconds.
pub fn parse_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.timestamp_millis())
        .ok()
}
