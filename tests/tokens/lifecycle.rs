//! Download token lifecycle over HTTP: issue, verify, download, and the
//! failure wording for each terminal state.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use axum::http::{Method, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_round_trip_issue_verify_download() {
    let ctx = create_test_app_state();

    let response = ctx
        .app()
        .oneshot(issue_request(json!({ "email": "buyer@example.com" }), Some(SERVICE_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let issued = body_json(response).await;
    assert_eq!(issued["success"], true);
    let download_url = issued["downloadUrl"].as_str().unwrap();
    assert!(download_url.starts_with(&format!("{}?token=", DOWNLOAD_BASE_URL)));
    let token = token_from_url(download_url);
    assert_eq!(token.len(), 64);

    let response = ctx.app().oneshot(verify_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let verified = body_json(response).await;
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["expiresAt"], issued["expiresAt"]);

    let response = ctx.app().oneshot(download_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        RESOURCE_URL
    );

    let response = ctx.app().oneshot(verify_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_json(response).await["error"], "Token already used");

    let response = ctx.app().oneshot(download_request(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_string(response).await, "Download link has already been used");
}

#[tokio::test]
async fn test_expires_at_is_iso8601_with_millis_one_day_out() {
    let ctx = create_test_app_state();
    let before = now();

    let response = ctx
        .app()
        .oneshot(issue_request(json!({ "email": "buyer@example.com" }), Some(SERVICE_KEY)))
        .await
        .unwrap();
    let body = body_json(response).await;
    let expires_at = body["expiresAt"].as_str().unwrap();

    assert!(expires_at.ends_with(".000Z"), "got {}", expires_at);
    let parsed = chrono::DateTime::parse_from_rfc3339(expires_at).unwrap().timestamp();
    assert!(parsed >= before + 24 * ONE_HOUR);
    assert!(parsed <= now() + 24 * ONE_HOUR);
}

#[tokio::test]
async fn test_token_issued_25_hours_ago_is_expired() {
    let ctx = create_test_app_state();
    let issued = issue_token(&ctx.state, "buyer@example.com", now() - 25 * ONE_HOUR);

    let response = ctx.app().oneshot(verify_request(&issued.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_json(response).await["error"], "Token expired");

    let response = ctx.app().oneshot(download_request(&issued.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_string(response).await, "Download link has expired");

    // The failed download did not mark it used
    let conn = ctx.state.db.get().unwrap();
    let record = queries::get_download_token(&conn, &issued.token).unwrap().unwrap();
    assert!(!record.is_used);
    assert_eq!(record.downloaded_at, None);
}

#[tokio::test]
async fn test_unknown_token() {
    let ctx = create_test_app_state();
    let unknown = "0".repeat(64);

    let response = ctx.app().oneshot(download_request(&unknown)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Invalid download token");

    let response = ctx.app().oneshot(verify_request(&unknown)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn test_missing_parameters() {
    let ctx = create_test_app_state();

    let response = ctx
        .app()
        .oneshot(json_request(Method::POST, "/verify-download-token", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Token is required");

    let response = ctx.app().oneshot(verify_request("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Token is required");

    let response = ctx
        .app()
        .oneshot(
            axum::http::Request::builder()
                .uri("/download-course")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid or missing download token");

    let response = ctx
        .app()
        .oneshot(issue_request(json!({ "email": "  " }), Some(SERVICE_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email is required");

    let response = ctx
        .app()
        .oneshot(issue_request(json!({}), Some(SERVICE_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_download_query_is_plain_text() {
    let ctx = create_test_app_state();

    let response = ctx
        .app()
        .oneshot(
            axum::http::Request::builder()
                .uri("/download-course?token=a&token=b")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "got {}", content_type);
    assert_eq!(body_string(response).await, "Invalid or missing download token");
}

#[tokio::test]
async fn test_malformed_json_body_is_rejected_as_json() {
    let ctx = create_test_app_state();

    let response = ctx
        .app()
        .oneshot(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/verify-download-token")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_two_issuances_for_one_email_are_independent() {
    let ctx = create_test_app_state();
    let t0 = now();
    let first = issue_token(&ctx.state, "buyer@example.com", t0);
    let second = issue_token(&ctx.state, "buyer@example.com", t0);
    assert_ne!(first.token, second.token);

    // Spending one leaves the other untouched
    let response = ctx.app().oneshot(download_request(&first.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = ctx.app().oneshot(verify_request(&second.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = ctx.state.db.get().unwrap();
    let records = queries::list_download_tokens_by_email(&conn, "buyer@example.com").unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_valid_before_expiry_then_expired_on_consume() {
    let ctx = create_test_app_state();
    let t0 = now();
    let issued = issue_token(&ctx.state, "buyer@example.com", t0);
    let conn = ctx.state.db.get().unwrap();

    assert_eq!(
        tokens::validate(&conn, &issued.token, t0 + 23 * ONE_HOUR).unwrap(),
        TokenStatus::Valid {
            expires_at: issued.expires_at
        }
    );
    assert!(matches!(
        tokens::consume(&conn, &issued.token, t0 + 25 * ONE_HOUR),
        Err(AppError::Expired)
    ));
}

#[test]
fn test_consumed_token_reports_used_even_after_expiry() {
    let ctx = create_test_app_state();
    let t0 = now();
    let issued = issue_token(&ctx.state, "buyer@example.com", t0);
    let conn = ctx.state.db.get().unwrap();

    tokens::consume(&conn, &issued.token, t0 + ONE_HOUR).unwrap();

    assert_eq!(
        tokens::validate(&conn, &issued.token, t0 + 48 * ONE_HOUR).unwrap(),
        TokenStatus::Used
    );
}

#[test]
fn test_token_is_stored_hashed() {
    let ctx = create_test_app_state();
    let issued = issue_token(&ctx.state, "buyer@example.com", now());
    let conn = ctx.state.db.get().unwrap();

    let stored: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM download_tokens WHERE token_hash = ?1",
            [&issued.token],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, 0, "plaintext token must not be stored");

    let record = queries::get_download_token(&conn, &issued.token).unwrap().unwrap();
    assert_eq!(record.id, issued.id);
    assert!(record.id.starts_with("cd_tok_"));
    assert_eq!(record.email, "buyer@example.com");
}
