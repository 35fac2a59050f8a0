use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, DownloadError, Result};
use crate::extractors::{Json, Query};
use crate::models::{TokenStatus, to_iso8601};
use crate::util::extract_request_info;

#[derive(Debug, Deserialize)]
pub struct GenerateLinkRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLinkResponse {
    pub success: bool,
    pub download_url: String,
    pub expires_at: String,
}

/// POST /generate-download-link
///
/// Collaborator-facing: sits behind `require_service_key`.
pub async fn generate_download_link(
    State(state): State<AppState>,
    Json(req): Json<GenerateLinkRequest>,
) -> Result<Json<GenerateLinkResponse>> {
    let email = req.email.unwrap_or_default();
    let conn = state.db.get()?;

    let issued = crate::tokens::issue(&conn, &email, &state.download_base_url, queries::now())?;

    Ok(Json(GenerateLinkResponse {
        success: true,
        download_url: issued.download_url,
        expires_at: to_iso8601(issued.expires_at),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub expires_at: String,
}

/// POST /verify-download-token
///
/// Read-only; a page can call this before showing the download button.
pub async fn verify_download_token(
    State(state): State<AppState>,
    Json(req): Json<VerifyTokenRequest>,
) -> Result<Json<VerifyTokenResponse>> {
    let token = req.token.unwrap_or_default();
    let conn = state.db.get()?;

    match crate::tokens::validate(&conn, token.trim(), queries::now())? {
        TokenStatus::Valid { expires_at } => Ok(Json(VerifyTokenResponse {
            valid: true,
            expires_at: to_iso8601(expires_at),
        })),
        TokenStatus::Expired => Err(AppError::Expired),
        TokenStatus::Used => Err(AppError::AlreadyUsed),
        TokenStatus::NotFound => Err(AppError::NotFound),
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /download-course?token=...
///
/// Browser-facing, so failures are plain text rather than JSON.
pub async fn download_course(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: std::result::Result<Query<DownloadQuery>, AppError>,
) -> std::result::Result<Response, DownloadError> {
    // A malformed query string is still a missing token to the browser.
    let Query(query) = query?;
    let token = query.token.unwrap_or_default();
    let conn = state.db.get().map_err(AppError::from)?;

    let claimed = crate::tokens::consume(&conn, token.trim(), queries::now())?;

    let (ip, user_agent) = extract_request_info(&headers);
    tracing::info!(
        token_id = %claimed.id,
        ip = ip.as_deref().unwrap_or("-"),
        user_agent = user_agent.as_deref().unwrap_or("-"),
        "Course download started"
    );

    Ok((StatusCode::FOUND, [(header::LOCATION, state.resource_url)]).into_response())
}
