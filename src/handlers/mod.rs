pub mod checkout;
pub mod tokens;
pub mod webhooks;

use axum::{
    Json, Router,
    http::{HeaderName, Method, header},
    middleware,
    routing::{MethodRouter, get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::middleware::require_service_key;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Browser clients call these endpoints cross-origin, so every route answers
/// preflight for its own method.
pub fn cors(method: Method) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([method, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

fn with_cors(route: MethodRouter<AppState>, method: Method) -> MethodRouter<AppState> {
    route.layer(cors(method))
}

fn limited(router: Router<AppState>, requests_per_minute: Option<u32>) -> Router<AppState> {
    match requests_per_minute.and_then(rate_limit::layer) {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// All HTTP routes. `rate_limit` is None in tests, where requests carry no
/// peer address for the per-IP limiter to key on.
pub fn router(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let issue = post(tokens::generate_download_link)
        .route_layer(middleware::from_fn_with_state(state, require_service_key));

    let standard = Router::new()
        .route(
            "/generate-download-link",
            with_cors(issue, Method::POST),
        )
        .route(
            "/verify-download-token",
            with_cors(post(tokens::verify_download_token), Method::POST),
        )
        .route(
            "/download-course",
            with_cors(get(tokens::download_course), Method::GET),
        );

    let strict = Router::new().route(
        "/stripe-checkout",
        with_cors(post(checkout::create_checkout), Method::POST),
    );

    let relaxed = Router::new().route("/health", with_cors(get(health), Method::GET));

    Router::new()
        .merge(limited(standard, rate_limit.map(|r| r.standard_rpm)))
        .merge(limited(strict, rate_limit.map(|r| r.strict_rpm)))
        .merge(limited(relaxed, rate_limit.map(|r| r.relaxed_rpm)))
        // Stripe retries on 429; never throttle it
        .merge(webhooks::router())
}
