//! Exactly-once consumption under concurrent redemption attempts.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use std::sync::Barrier;

use axum::http::StatusCode;
use tower::ServiceExt;

const ATTEMPTS: usize = 8;

#[test]
fn test_concurrent_consumption_succeeds_exactly_once() {
    let ctx = create_test_app_state();
    let t0 = now();
    let issued = issue_token(&ctx.state, "buyer@example.com", t0);

    let barrier = Barrier::new(ATTEMPTS);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let pool = ctx.state.db.clone();
                let token = issued.token.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    let conn = pool.get().unwrap();
                    barrier.wait();
                    tokens::consume(&conn, &token, t0 + 60)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyUsed)))
        .count();

    assert_eq!(successes, 1, "exactly one redemption must win");
    assert_eq!(already_used, ATTEMPTS - 1);

    let conn = ctx.state.db.get().unwrap();
    let record = queries::get_download_token(&conn, &issued.token).unwrap().unwrap();
    assert!(record.is_used);
    assert_eq!(record.downloaded_at, Some(t0 + 60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_downloads_redirect_once() {
    let ctx = create_test_app_state();
    let issued = issue_token(&ctx.state, "buyer@example.com", now());

    let mut tasks = Vec::new();
    for _ in 0..ATTEMPTS {
        let app = ctx.app();
        let token = issued.token.clone();
        tasks.push(tokio::spawn(async move {
            app.oneshot(download_request(&token)).await.unwrap().status()
        }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::FOUND).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::GONE).count(),
        ATTEMPTS - 1
    );
}
