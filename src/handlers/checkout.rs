use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

/// POST /stripe-checkout
///
/// Starts a hosted Stripe checkout for the course price. Fulfilment happens
/// later, when the completion webhook arrives.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let email = req.customer_email.unwrap_or_default();
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::MissingParameter(msg::EMAIL_REQUIRED));
    }

    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| AppError::Internal(msg::STRIPE_NOT_CONFIGURED.into()))?;

    let (session_id, url) = stripe.create_checkout_session(email).await?;

    tracing::info!(session_id = %session_id, "Checkout session created");

    Ok(Json(CheckoutResponse { session_id, url }))
}
