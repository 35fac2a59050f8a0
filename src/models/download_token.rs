use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a freshly issued download token (24 hours).
pub const DOWNLOAD_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// A single-use download grant.
///
/// The plaintext token is never stored; rows are looked up by `token_hash`.
/// `is_used` and `downloaded_at` are always written by the same statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToken {
    pub id: String,
    pub token_hash: String,
    /// Recipient the token was issued for (informational)
    pub email: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub is_used: bool,
    pub downloaded_at: Option<i64>,
}

impl DownloadToken {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Read-only classification. A consumed token reports `Used` even once
    /// it is also past its expiry.
    pub fn status_at(&self, now: i64) -> TokenStatus {
        if self.is_used {
            TokenStatus::Used
        } else if self.is_expired_at(now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Valid {
                expires_at: self.expires_at,
            }
        }
    }
}

/// Outcome of validating a token without consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid { expires_at: i64 },
    Expired,
    Used,
    NotFound,
}

/// Result of issuing a token. Holds the only copy of the plaintext token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub id: String,
    pub token: String,
    pub email: String,
    pub download_url: String,
    pub expires_at: i64,
}

/// Format a unix timestamp as ISO-8601 UTC with millisecond precision,
/// e.g. `2024-01-15T10:30:00.000Z`.
pub fn to_iso8601(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
