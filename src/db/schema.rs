use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Download tokens (single-use, time-limited download grants)
        -- Only the salted hash of the token is stored.
        -- is_used and downloaded_at always change together.
        CREATE TABLE IF NOT EXISTS download_tokens (
            id TEXT PRIMARY KEY,
            token_hash TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            downloaded_at INTEGER,
            CHECK (
                (is_used = 0 AND downloaded_at IS NULL)
                OR (is_used = 1 AND downloaded_at IS NOT NULL)
            )
        );
        CREATE INDEX IF NOT EXISTS idx_download_tokens_email ON download_tokens(email);
        CREATE INDEX IF NOT EXISTS idx_download_tokens_expires ON download_tokens(expires_at);

        -- Orders (completed one-time payments, one per checkout session)
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            checkout_session_id TEXT NOT NULL UNIQUE,
            payment_intent_id TEXT,
            customer_id TEXT,
            customer_email TEXT,
            amount_subtotal INTEGER NOT NULL DEFAULT 0,
            amount_total INTEGER NOT NULL DEFAULT 0,
            currency TEXT NOT NULL,
            payment_status TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('completed')),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
        "#,
    )
}
