mod from_row;
mod schema;
pub mod queries;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state handed to every handler.
///
/// Built explicitly in `main` (or a test) so handlers never reach for a
/// process-wide store client.
#[derive(Clone)]
pub struct AppState {
    /// Token store and order ledger
    pub db: DbPool,
    /// Link target for issued tokens; the token is appended as `?token=`
    pub download_base_url: String,
    /// Protected resource a consumed token redirects to
    pub resource_url: String,
    /// Bearer key for the collaborator-facing issuance endpoint
    pub service_api_key: Option<String>,
    /// None when Stripe is not configured (checkout and webhook reject)
    pub stripe: Option<StripeClient>,
    pub email_service: Arc<EmailService>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
