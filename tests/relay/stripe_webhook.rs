//! Stripe webhook: signature checks, event filtering, replay handling.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use axum::http::StatusCode;
use tower::ServiceExt;

use coursedrop::handlers::webhooks::{CheckoutOutcome, record_completed_checkout};
use coursedrop::payments::StripeCheckoutSession;

fn order_count(ctx: &TestContext) -> i64 {
    let conn = ctx.state.db.get().unwrap();
    queries::count_orders(&conn).unwrap()
}

fn token_count(ctx: &TestContext, email: &str) -> usize {
    let conn = ctx.state.db.get().unwrap();
    queries::list_download_tokens_by_email(&conn, email)
        .unwrap()
        .len()
}

fn signed(payload: &[u8]) -> String {
    stripe_signature_header(payload, now())
}

#[tokio::test]
async fn test_paid_checkout_records_order_and_issues_token() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_paid", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&signed(&payload))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["received"], true);

    let conn = ctx.state.db.get().unwrap();
    let order = queries::get_order_by_checkout_session(&conn, "cs_test_paid")
        .unwrap()
        .expect("order recorded");
    assert_eq!(order.status, "completed");
    assert_eq!(order.amount_total, 4900);
    assert_eq!(order.currency, "usd");
    assert_eq!(order.customer_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_cs_test_paid"));

    let tokens = queries::list_download_tokens_by_email(&conn, "buyer@example.com").unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(!tokens[0].is_used);
}

#[tokio::test]
async fn test_replayed_event_yields_one_order_one_token() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_replay", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();

    for _ in 0..3 {
        let response = ctx
            .app()
            .oneshot(webhook_request(&payload, Some(&signed(&payload))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(order_count(&ctx), 1);
    assert_eq!(token_count(&ctx, "buyer@example.com"), 1);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_nosig", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();

    let response = ctx.app().oneshot(webhook_request(&payload, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "No signature found");
    assert_eq!(order_count(&ctx), 0);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_badsig", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();
    let timestamp = now().to_string();
    let forged = compute_stripe_signature(&payload, "whsec_wrong", &timestamp);
    let header = format!("t={},v1={}", timestamp, forged);

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Webhook signature verification failed");
    assert_eq!(order_count(&ctx), 0);
    assert_eq!(token_count(&ctx, "buyer@example.com"), 0);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_stale", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();
    // Correctly signed, but ten minutes old
    let header = stripe_signature_header(&payload, now() - 600);

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&ctx), 0);
}

#[tokio::test]
async fn test_future_timestamp_is_rejected() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_future", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();
    // Correctly signed, but two minutes ahead (past the allowed skew)
    let header = stripe_signature_header(&payload, now() + 120);

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&ctx), 0);
}

#[tokio::test]
async fn test_empty_webhook_secret_never_verifies() {
    let mut ctx = create_test_app_state();
    let mut config = test_stripe_config();
    config.webhook_secret = String::new();
    ctx.state.stripe = Some(StripeClient::new(&config));

    let payload = checkout_completed_event("cs_test_forged", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();
    let timestamp = now().to_string();
    let forged = compute_stripe_signature(&payload, "", &timestamp);
    let header = format!("t={},v1={}", timestamp, forged);

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&header)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&ctx), 0);
    assert_eq!(token_count(&ctx, "buyer@example.com"), 0);
}

#[tokio::test]
async fn test_malformed_signature_header_is_rejected() {
    let ctx = create_test_app_state();
    let payload = b"{}".to_vec();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some("garbage")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unpaid_checkout_is_acknowledged_without_fulfilment() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_unpaid", Some("buyer@example.com"), "unpaid")
        .to_string()
        .into_bytes();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&signed(&payload))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(order_count(&ctx), 0);
}

#[tokio::test]
async fn test_other_event_types_are_acknowledged() {
    let ctx = create_test_app_state();
    let payload = serde_json::json!({
        "id": "evt_other",
        "type": "customer.created",
        "data": { "object": { "id": "cus_123" } }
    })
    .to_string()
    .into_bytes();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&signed(&payload))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["received"], true);
    assert_eq!(order_count(&ctx), 0);
}

#[tokio::test]
async fn test_checkout_without_email_records_order_only() {
    let ctx = create_test_app_state();
    let payload = checkout_completed_event("cs_test_noemail", None, "paid")
        .to_string()
        .into_bytes();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&signed(&payload))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(order_count(&ctx), 1);

    let conn = ctx.state.db.get().unwrap();
    let issued: i64 = conn
        .query_row("SELECT COUNT(*) FROM download_tokens", [], |row| row.get(0))
        .unwrap();
    assert_eq!(issued, 0);
}

#[tokio::test]
async fn test_unconfigured_stripe_acknowledges_without_processing() {
    let mut ctx = create_test_app_state();
    ctx.state.stripe = None;
    let payload = checkout_completed_event("cs_test_unconfigured", Some("buyer@example.com"), "paid")
        .to_string()
        .into_bytes();

    let response = ctx
        .app()
        .oneshot(webhook_request(&payload, Some(&signed(&payload))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(order_count(&ctx), 0);
}

#[test]
fn test_record_completed_checkout_detects_duplicates() {
    let ctx = create_test_app_state();
    let session: StripeCheckoutSession = serde_json::from_value(
        checkout_completed_event("cs_test_direct", Some("buyer@example.com"), "paid")["data"]
            ["object"]
            .clone(),
    )
    .unwrap();
    let mut conn = ctx.state.db.get().unwrap();
    let t0 = now();

    let first = record_completed_checkout(
        &mut conn,
        &session,
        session.email(),
        DOWNLOAD_BASE_URL,
        t0,
    )
    .unwrap();
    let issued = match first {
        CheckoutOutcome::Issued(issued) => issued,
        other => panic!("expected a token to be issued, got {:?}", other),
    };
    assert_eq!(issued.email, "buyer@example.com");
    assert_eq!(issued.expires_at, t0 + DOWNLOAD_TOKEN_TTL_SECONDS);

    let second = record_completed_checkout(
        &mut conn,
        &session,
        session.email(),
        DOWNLOAD_BASE_URL,
        t0,
    )
    .unwrap();
    assert!(matches!(second, CheckoutOutcome::Duplicate));
    assert_eq!(queries::count_orders(&conn).unwrap(), 1);
}
