//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const DOWNLOAD_TOKEN_COLS: &str =
    "id, token_hash, email, created_at, expires_at, is_used, downloaded_at";

pub const ORDER_COLS: &str = "id, checkout_session_id, payment_intent_id, customer_id, customer_email, amount_subtotal, amount_total, currency, payment_status, status, created_at";

// ============ FromRow Implementations ============

impl FromRow for DownloadToken {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DownloadToken {
            id: row.get(0)?,
            token_hash: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
            expires_at: row.get(4)?,
            is_used: row.get::<_, i32>(5)? != 0,
            downloaded_at: row.get(6)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            checkout_session_id: row.get(1)?,
            payment_intent_id: row.get(2)?,
            customer_id: row.get(3)?,
            customer_email: row.get(4)?,
            amount_subtotal: row.get(5)?,
            amount_total: row.get(6)?,
            currency: row.get(7)?,
            payment_status: row.get(8)?,
            status: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}
