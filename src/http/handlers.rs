//! Session and notification handlers for signed-in users.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::Principal;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::notifications::Notification;

#[derive(Serialize)]
pub struct HealthStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

/// The caller's identity as decoded from the token.
pub async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

/// Clear the identity cookie.
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = Cookie::build((state.auth.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.auth.secure_cookie)
        .removal()
        .build();

    let mut response = Json(json!({ "message": "Logged out" })).into_response();
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(e) => ApiError::Internal(format!("invalid cookie header: {e}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: usize,
}

#[derive(Serialize)]
pub struct NotificationEnvelope {
    pub notification: Notification,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<NotificationList>, ApiError> {
    let Query(params) = params?;
    let limit = state.clamp_limit(params.limit);
    let notifications = state
        .notifications
        .list_for_user(&principal.user_id, Some(limit), params.unread_only)
        .await?;
    let unread_count = state.notifications.unread_count(&principal.user_id).await?;

    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UnreadCount>, ApiError> {
    let unread_count = state.notifications.unread_count(&principal.user_id).await?;
    Ok(Json(UnreadCount { unread_count }))
}

/// Mark one of the caller's notifications read.
///
/// Someone else's notification answers 404, same as a missing id.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<NotificationEnvelope>, ApiError> {
    let existing = state.notifications.get(&id).await?;
    if existing.user_id != principal.user_id {
        tracing::info!(
            notification_id = %id,
            user_id = %principal.user_id,
            "Refused to mark another user's notification"
        );
        return Err(ApiError::NotFound);
    }

    let notification = state.notifications.mark_as_read(&id).await?;
    Ok(Json(NotificationEnvelope { notification }))
}
