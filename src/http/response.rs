//! Uniform error responses.
//!
//! # Responsibilities
//! - Map admission and storage failures to status codes
//! - Keep internal details out of response bodies
//! - Attach `Retry-After` to rate-limit denials
//!
//! | Error            | Status |
//! |------------------|--------|
//! | Unauthenticated  | 401    |
//! | Forbidden        | 403    |
//! | NotFound         | 404    |
//! | RateLimited      | 429    |
//! | BadRequest       | 400    |
//! | anything else    | 500    |

use std::time::Duration;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::notifications::NotificationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Logged at the boundary; the detail never reaches the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whole seconds, rounded up, for the `Retry-After` header.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Unauthenticated => {
                (status, Json(json!({ "error": "Unauthorized" }))).into_response()
            }
            ApiError::Forbidden => (status, Json(json!({ "error": "Access denied" }))).into_response(),
            ApiError::NotFound => (status, Json(json!({ "error": "Not found" }))).into_response(),
            ApiError::RateLimited { retry_after } => {
                let secs = retry_after_secs(retry_after);
                let mut response = (
                    status,
                    Json(json!({ "error": "Too many requests", "retryAfterSecs": secs })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            ApiError::BadRequest(message) => (status, Json(json!({ "error": message }))).into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => ApiError::Unauthenticated,
            AuthError::Forbidden => ApiError::Forbidden,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<NotificationError> for ApiError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::NotFound(_) => ApiError::NotFound,
            NotificationError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}
