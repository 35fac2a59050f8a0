//! Per-IP rate limiting for public endpoints.
//!
//! Tiers:
//! - Strict: /stripe-checkout - external API calls
//! - Standard: /generate-download-link, /verify-download-token, /download-course
//! - Relaxed: /health
//!
//! The Stripe webhook is never limited; Stripe retries on 429 and we'd only
//! delay fulfilment.

use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer with the specified requests per minute.
/// Returns None for 0, which disables the tier.
pub fn layer(requests_per_minute: u32) -> Option<RateLimitLayer> {
    if requests_per_minute == 0 {
        return None;
    }

    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)))
}
