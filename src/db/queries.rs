use chrono::Utc;
use rusqlite::{Connection, params};

use crate::crypto::hash_secret;
use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{DOWNLOAD_TOKEN_COLS, ORDER_COLS, query_all, query_one};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Download Tokens ============

/// Insert a new unused token row. Returns the stored record.
///
/// `token` is the plaintext; only its hash is written. A hash collision
/// surfaces as a UNIQUE constraint violation (storage error).
pub fn create_download_token(
    conn: &Connection,
    token: &str,
    email: &str,
    now: i64,
    ttl_seconds: i64,
) -> Result<DownloadToken> {
    let id = EntityType::DownloadToken.gen_id();
    let token_hash = hash_secret(token);
    let expires_at = now + ttl_seconds;

    conn.execute(
        "INSERT INTO download_tokens (id, token_hash, email, created_at, expires_at, is_used, downloaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)",
        params![&id, &token_hash, email, now, expires_at],
    )?;

    Ok(DownloadToken {
        id,
        token_hash,
        email: email.to_string(),
        created_at: now,
        expires_at,
        is_used: false,
        downloaded_at: None,
    })
}

pub fn get_download_token(conn: &Connection, token: &str) -> Result<Option<DownloadToken>> {
    let token_hash = hash_secret(token);
    query_one(
        conn,
        &format!(
            "SELECT {} FROM download_tokens WHERE token_hash = ?1",
            DOWNLOAD_TOKEN_COLS
        ),
        &[&token_hash],
    )
}

/// Atomically claim a download token.
///
/// The UPDATE only matches if the token exists, is unused and has not
/// expired, so of several concurrent callers exactly one sees an affected
/// row. `is_used` and `downloaded_at` are written by the same statement.
///
/// Returns Ok(Some(token)) if this call claimed it.
/// Returns Ok(None) if the token doesn't exist, is already used, or is expired.
pub fn try_claim_download_token(
    conn: &Connection,
    token: &str,
    now: i64,
) -> Result<Option<DownloadToken>> {
    let token_hash = hash_secret(token);

    let affected = conn.execute(
        "UPDATE download_tokens SET is_used = 1, downloaded_at = ?2
         WHERE token_hash = ?1 AND is_used = 0 AND expires_at > ?2",
        params![&token_hash, now],
    )?;

    if affected == 0 {
        return Ok(None);
    }

    query_one(
        conn,
        &format!(
            "SELECT {} FROM download_tokens WHERE token_hash = ?1",
            DOWNLOAD_TOKEN_COLS
        ),
        &[&token_hash],
    )
}

/// All tokens ever issued to an address, newest first (audit/support use).
pub fn list_download_tokens_by_email(conn: &Connection, email: &str) -> Result<Vec<DownloadToken>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM download_tokens WHERE email = ?1 ORDER BY created_at DESC, rowid DESC",
            DOWNLOAD_TOKEN_COLS
        ),
        &[&email],
    )
}

// ============ Orders ============

/// Record a completed order.
///
/// Returns Ok(None) if an order for this checkout session already exists,
/// which is how replayed completion events are detected.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Option<Order>> {
    let id = EntityType::Order.gen_id();
    let now = now();

    let affected = conn.execute(
        "INSERT INTO orders (id, checkout_session_id, payment_intent_id, customer_id, customer_email,
                             amount_subtotal, amount_total, currency, payment_status, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'completed', ?10)
         ON CONFLICT(checkout_session_id) DO NOTHING",
        params![
            &id,
            &input.checkout_session_id,
            &input.payment_intent_id,
            &input.customer_id,
            &input.customer_email,
            input.amount_subtotal,
            input.amount_total,
            &input.currency,
            &input.payment_status,
            now,
        ],
    )?;

    if affected == 0 {
        return Ok(None);
    }

    Ok(Some(Order {
        id,
        checkout_session_id: input.checkout_session_id.clone(),
        payment_intent_id: input.payment_intent_id.clone(),
        customer_id: input.customer_id.clone(),
        customer_email: input.customer_email.clone(),
        amount_subtotal: input.amount_subtotal,
        amount_total: input.amount_total,
        currency: input.currency.clone(),
        payment_status: input.payment_status.clone(),
        status: "completed".to_string(),
        created_at: now,
    }))
}

pub fn get_order_by_checkout_session(
    conn: &Connection,
    checkout_session_id: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE checkout_session_id = ?1",
            ORDER_COLS
        ),
        &[&checkout_session_id],
    )
}

pub fn count_orders(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
    Ok(count)
}
