use serde::{Deserialize, Serialize};

/// A completed one-time payment, recorded from the payment processor's
/// completion event. `checkout_session_id` is unique, which makes event
/// replays detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    /// Amounts in minor currency units (cents)
    pub amount_subtotal: i64,
    pub amount_total: i64,
    pub currency: String,
    pub payment_status: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug)]
pub struct CreateOrder {
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount_subtotal: i64,
    pub amount_total: i64,
    pub currency: String,
    pub payment_status: String,
}
