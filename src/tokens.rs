//! Single-use download token lifecycle: issue, validate, consume.
//!
//! Every operation takes the current time explicitly so the expiry rules can
//! be exercised without waiting on a wall clock. Handlers pass `queries::now()`.

use rusqlite::Connection;

use crate::crypto::generate_token;
use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{DOWNLOAD_TOKEN_TTL_SECONDS, DownloadToken, IssuedToken, TokenStatus};

/// Build the link a buyer follows: `{base}?token={token}`.
pub fn build_download_url(download_base_url: &str, token: &str) -> String {
    let sep = if download_base_url.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", download_base_url, sep, token)
}

/// Mint and persist a fresh token for `email`, valid for 24 hours.
///
/// Fire-once: a storage failure is returned to the caller, who owns any retry.
pub fn issue(
    conn: &Connection,
    email: &str,
    download_base_url: &str,
    now: i64,
) -> Result<IssuedToken> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::MissingParameter(msg::EMAIL_REQUIRED));
    }

    let token = generate_token();
    let record =
        queries::create_download_token(conn, &token, email, now, DOWNLOAD_TOKEN_TTL_SECONDS)?;

    tracing::info!(
        token_id = %record.id,
        email = %record.email,
        expires_at = record.expires_at,
        "Download token issued"
    );

    Ok(IssuedToken {
        download_url: build_download_url(download_base_url, &token),
        id: record.id,
        token,
        email: record.email,
        expires_at: record.expires_at,
    })
}

/// Report a token's state without touching it. Safe to call repeatedly.
pub fn validate(conn: &Connection, token: &str, now: i64) -> Result<TokenStatus> {
    if token.is_empty() {
        return Err(AppError::MissingParameter(msg::TOKEN_REQUIRED));
    }

    Ok(match queries::get_download_token(conn, token)? {
        Some(record) => record.status_at(now),
        None => TokenStatus::NotFound,
    })
}

/// Redeem a token, exactly once.
///
/// The claim itself is a single conditional UPDATE; only when it matches
/// nothing do we read the row to explain why. Expiry is reported ahead of
/// prior use here. Nothing is written on failure.
pub fn consume(conn: &Connection, token: &str, now: i64) -> Result<DownloadToken> {
    if token.is_empty() {
        return Err(AppError::MissingParameter(msg::DOWNLOAD_TOKEN_MISSING));
    }

    if let Some(claimed) = queries::try_claim_download_token(conn, token, now)? {
        tracing::info!(
            token_id = %claimed.id,
            email = %claimed.email,
            "Download token consumed"
        );
        return Ok(claimed);
    }

    let err = match queries::get_download_token(conn, token)? {
        None => AppError::NotFound,
        Some(record) if record.is_expired_at(now) => AppError::Expired,
        Some(_) => AppError::AlreadyUsed,
    };

    tracing::debug!(reason = %err, "Download token rejected");
    Err(err)
}
