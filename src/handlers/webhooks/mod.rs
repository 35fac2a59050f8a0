pub mod stripe;

pub use stripe::{CheckoutOutcome, handle_stripe_webhook, record_completed_checkout};

use axum::{Router, http::Method, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/stripe-webhook",
        post(handle_stripe_webhook).layer(super::cors(Method::POST)),
    )
}
