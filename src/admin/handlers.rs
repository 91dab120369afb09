use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::handlers::NotificationEnvelope;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::notifications::{Notification, NotificationPayload, NotificationStatus};

/// Page size of the admin feed when no limit is given.
pub const DEFAULT_FEED_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub total: usize,
}

pub async fn get_notifications(
    State(state): State<AppState>,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<NotificationFeed>, ApiError> {
    let Query(params) = params?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .min(state.notification_config.max_limit);

    let notifications = state.notifications.list_recent(limit).await?;
    let unread_count = state
        .notifications
        .total_count(Some(NotificationStatus::Unread))
        .await?;
    let total = state.notifications.total_count(None).await?;

    Ok(Json(NotificationFeed {
        notifications,
        unread_count,
        total,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub user_id: String,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

pub async fn create_notification(
    State(state): State<AppState>,
    body: Result<Json<CreateNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationEnvelope>), ApiError> {
    let Json(body) = body?;
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId is required".into()));
    }
    let notification = state.notifications.create(&body.user_id, body.payload).await?;
    Ok((StatusCode::CREATED, Json(NotificationEnvelope { notification })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    MarkRead,
    MarkAllRead,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotifications {
    pub action: AdminAction,
    pub notification_id: Option<String>,
    /// Restricts `mark_all_read` to one user.
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateResult {
    pub success: bool,
    pub updated: usize,
}

pub async fn update_notifications(
    State(state): State<AppState>,
    body: Result<Json<UpdateNotifications>, JsonRejection>,
) -> Result<Json<UpdateResult>, ApiError> {
    let Json(body) = body?;
    let updated = match body.action {
        AdminAction::MarkRead => {
            let id = body
                .notification_id
                .ok_or_else(|| ApiError::BadRequest("notificationId is required".into()))?;
            let outcome = state.notifications.mark_read_outcome(&id).await?;
            usize::from(outcome.changed)
        }
        AdminAction::MarkAllRead => {
            state
                .notifications
                .mark_all_read(body.user_id.as_deref())
                .await?
        }
    };

    Ok(Json(UpdateResult {
        success: true,
        updated,
    }))
}
