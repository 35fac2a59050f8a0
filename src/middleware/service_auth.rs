use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::crypto::secrets_match;
use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Guard for collaborator-facing endpoints.
///
/// Requires `Authorization: Bearer <SERVICE_API_KEY>`. With no key
/// configured every request is rejected, so tokens can't be minted by an
/// anonymous caller.
pub async fn require_service_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.service_api_key.as_deref() else {
        tracing::warn!("Service endpoint called but SERVICE_API_KEY is not configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let provided = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    if !secrets_match(provided, expected) {
        tracing::debug!("Service key mismatch");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
