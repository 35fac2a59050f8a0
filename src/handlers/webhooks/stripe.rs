use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::db::{AppState, queries};
use crate::email::EmailService;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{CreateOrder, IssuedToken};
use crate::payments::{StripeCheckoutSession, StripeClient, StripeWebhookEvent};

/// Result type for webhook failures: status plus a short plain-text reason.
pub type WebhookResult = (StatusCode, &'static str);

/// What a completed checkout turned into.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Order recorded and a download token minted
    Issued(IssuedToken),
    /// The checkout session was already recorded; replayed event
    Duplicate,
    /// Order recorded, but there is no address to send a link to
    NoEmail,
}

/// Record the order and mint its download token in one transaction.
///
/// The order row is the replay guard: if token issuance fails the order is
/// rolled back with it, so the processor's retry can complete fulfilment.
pub fn record_completed_checkout(
    conn: &mut Connection,
    session: &StripeCheckoutSession,
    email: Option<&str>,
    download_base_url: &str,
    now: i64,
) -> Result<CheckoutOutcome> {
    let email = email.map(str::trim).filter(|e| !e.is_empty());

    let tx = conn.transaction()?;

    let order = queries::create_order(
        &tx,
        &CreateOrder {
            checkout_session_id: session.id.clone(),
            payment_intent_id: session.payment_intent.clone(),
            customer_id: session.customer.clone(),
            customer_email: email.map(str::to_string),
            amount_subtotal: session.amount_subtotal.unwrap_or(0),
            amount_total: session.amount_total.unwrap_or(0),
            currency: session.currency.clone().unwrap_or_default(),
            payment_status: session.payment_status.clone(),
        },
    )?;

    let Some(order) = order else {
        return Ok(CheckoutOutcome::Duplicate);
    };

    let Some(email) = email else {
        tx.commit()?;
        tracing::warn!(
            order_id = %order.id,
            session_id = %session.id,
            "Order recorded without a customer email; no download link sent"
        );
        return Ok(CheckoutOutcome::NoEmail);
    };

    let issued = crate::tokens::issue(&tx, email, download_base_url, now)?;
    tx.commit()?;

    tracing::info!(
        order_id = %order.id,
        token_id = %issued.id,
        session_id = %session.id,
        "Checkout fulfilled"
    );

    Ok(CheckoutOutcome::Issued(issued))
}

fn extract_signature(headers: &HeaderMap) -> std::result::Result<&str, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "No signature found"))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

/// Email from the event, falling back to the Stripe customer object.
async fn resolve_email(client: &StripeClient, session: &StripeCheckoutSession) -> Option<String> {
    if let Some(email) = session.email() {
        return Some(email.to_string());
    }

    let customer_id = session.customer.as_deref()?;
    match client.get_customer_email(customer_id).await {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!(customer_id, "Failed to look up customer email: {}", e);
            None
        }
    }
}

fn spawn_email(email_service: Arc<EmailService>, issued: IssuedToken) {
    tokio::spawn(async move {
        if let Err(e) = email_service
            .send_download_link(&issued.email, &issued.download_url, issued.expires_at)
            .await
        {
            tracing::error!(token_id = %issued.id, "Failed to send download link email: {}", e);
        }
    });
}

async fn process_event(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> std::result::Result<(), WebhookResult> {
    // Without credentials nothing can be verified; answer 200 so Stripe
    // doesn't retry forever.
    let Some(client) = state.stripe.as_ref() else {
        return Err((StatusCode::OK, "Stripe not configured"));
    };

    let signature = extract_signature(headers)?;

    match client.verify_webhook_signature(body, signature) {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::BAD_REQUEST, "Webhook signature verification failed")),
        Err(e) => {
            tracing::warn!("Stripe signature rejected: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Webhook signature verification failed"));
        }
    }

    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid JSON")
    })?;

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event");
        return Ok(());
    }

    let session: StripeCheckoutSession =
        serde_json::from_value(event.data.object).map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid checkout session")
        })?;

    if !session.is_paid_one_time() {
        tracing::debug!(
            session_id = %session.id,
            payment_status = %session.payment_status,
            "Ignoring checkout that is not a paid one-time payment"
        );
        return Ok(());
    }

    let db_error = |e: &dyn std::fmt::Display| {
        tracing::error!("Database error handling checkout: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    };

    // Skip the customer lookup for replays; the transaction below is still
    // what decides.
    let already_recorded = {
        let conn = state.db.get().map_err(|e| db_error(&e))?;
        queries::get_order_by_checkout_session(&conn, &session.id)
            .map_err(|e| db_error(&e))?
            .is_some()
    };
    if already_recorded {
        tracing::info!(session_id = %session.id, "Checkout already processed");
        return Ok(());
    }

    let email = resolve_email(client, &session).await;

    let mut conn = state.db.get().map_err(|e| db_error(&e))?;
    let outcome = record_completed_checkout(
        &mut conn,
        &session,
        email.as_deref(),
        &state.download_base_url,
        queries::now(),
    )
    .map_err(|e| {
        tracing::error!(
            session_id = %session.id,
            retryable = e.is_retryable(),
            "Checkout fulfilment failed: {}",
            e
        );
        (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    match outcome {
        CheckoutOutcome::Issued(issued) => spawn_email(state.email_service.clone(), issued),
        CheckoutOutcome::Duplicate => {
            tracing::info!(session_id = %session.id, "Checkout already processed");
        }
        CheckoutOutcome::NoEmail => {}
    }

    Ok(())
}

/// POST /stripe-webhook
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process_event(&state, &headers, &body).await {
        Ok(()) => Json(serde_json::json!({ "received": true })).into_response(),
        Err(result) => result.into_response(),
    }
}
