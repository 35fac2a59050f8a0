//! Prefixed ID generation for stored entities.
//!
//! All IDs use a `cd_` brand prefix so they never collide with payment
//! provider IDs (Stripe's `cs_`, `pi_`, `cus_`, etc.).
//!
//! Format: `cd_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    DownloadToken,
    Order,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::DownloadToken => "cd_tok",
            Self::Order => "cd_ord",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
