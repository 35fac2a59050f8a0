use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages.
///
/// Expired, already-used and unknown tokens get distinct wording because the
/// remediation differs (request a new link vs. contact support).
pub mod msg {
    pub const EMAIL_REQUIRED: &str = "Email is required";
    pub const TOKEN_REQUIRED: &str = "Token is required";
    pub const INVALID_TOKEN: &str = "Invalid token";
    pub const TOKEN_EXPIRED: &str = "Token expired";
    pub const TOKEN_ALREADY_USED: &str = "Token already used";

    pub const DOWNLOAD_TOKEN_MISSING: &str = "Invalid or missing download token";
    pub const DOWNLOAD_TOKEN_INVALID: &str = "Invalid download token";
    pub const DOWNLOAD_EXPIRED: &str = "Download link has expired";
    pub const DOWNLOAD_ALREADY_USED: &str = "Download link has already been used";
    pub const DOWNLOAD_FAILED: &str = "Error processing download";

    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
    pub const STRIPE_NOT_CONFIGURED: &str = "Stripe is not configured";
}

/// Storage-layer failures. The only error class a caller may sensibly retry.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Token not found")]
    NotFound,

    #[error("Token expired")]
    Expired,

    #[error("Token already used")]
    AlreadyUsed,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(StorageError::Sqlite(e))
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        AppError::Storage(StorageError::Pool(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Json(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_) | AppError::BadRequest(_) | AppError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Expired | AppError::AlreadyUsed => StatusCode::GONE,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for transient infrastructure faults. Everything else describes the
    /// token's actual state and retrying cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }

    fn log_if_internal(&self) {
        match self {
            AppError::Storage(e) => tracing::error!("Storage error: {}", e),
            AppError::Internal(m) => tracing::error!("Internal error: {}", m),
            _ => {}
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log_if_internal();

        let (error, details) = match &self {
            AppError::MissingParameter(m) => (*m, None),
            AppError::NotFound => (msg::INVALID_TOKEN, None),
            AppError::Expired => (msg::TOKEN_EXPIRED, None),
            AppError::AlreadyUsed => (msg::TOKEN_ALREADY_USED, None),
            AppError::BadRequest(m) => ("Bad request", Some(m.clone())),
            AppError::Unauthorized => ("Unauthorized", None),
            AppError::Json(m) => ("Invalid JSON", Some(m.clone())),
            AppError::Storage(_) | AppError::Internal(_) => ("Internal server error", None),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Plain-text rendering of a token error for the browser-facing download link.
#[derive(Debug)]
pub struct DownloadError(pub AppError);

impl From<AppError> for DownloadError {
    fn from(e: AppError) -> Self {
        DownloadError(e)
    }
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        self.0.log_if_internal();

        let text = match &self.0 {
            AppError::MissingParameter(_) | AppError::BadRequest(_) => msg::DOWNLOAD_TOKEN_MISSING,
            AppError::NotFound => msg::DOWNLOAD_TOKEN_INVALID,
            AppError::Expired => msg::DOWNLOAD_EXPIRED,
            AppError::AlreadyUsed => msg::DOWNLOAD_ALREADY_USED,
            _ => msg::DOWNLOAD_FAILED,
        };

        // Map everything else onto 500 so internals never surface as a 4xx.
        let status = match &self.0 {
            AppError::Unauthorized | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            e => e.status(),
        };

        (status, text).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
