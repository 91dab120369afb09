//! Administrative notification endpoints, restricted to the admin role.

pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::handlers::{create_notification, get_notifications, update_notifications};
use crate::auth::{require_auth, AuthLayerState};
use crate::http::server::AppState;
use crate::security::rate_limit::rate_limit_middleware;

/// Rate-limit scope for admin routes.
pub const ADMIN_SCOPE: &str = "admin";

pub fn setup_admin_router(state: &AppState) -> Router<AppState> {
    let auth = AuthLayerState::with_role(
        state.gate.clone(),
        &state.auth.cookie_name,
        &state.auth.admin_role,
    );

    Router::new()
        .route(
            "/api/admin/notifications",
            get(get_notifications)
                .post(create_notification)
                .patch(update_notifications),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_auth))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit_gate(ADMIN_SCOPE),
            rate_limit_middleware,
        ))
}
