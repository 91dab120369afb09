//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, metrics, headers)
//! - Put rate limiting in front of authorization on every protected group
//! - Apply hot-reloaded rate-limit quotas
//! - Serve until the shutdown signal, then drain

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::auth::{require_auth, AuthLayerState, AuthorizationGate, TokenVerifier};
use crate::config::{AppConfig, AuthConfig, NotificationConfig, RateLimitConfig};
use crate::http::handlers;
use crate::notifications::{InMemoryNotificationRepository, NotificationRepository, NotificationStore};
use crate::observability::metrics;
use crate::security::headers::with_security_headers;
use crate::security::rate_limit::{rate_limit_middleware, run_sweeper, RateLimitGate, RateLimiter};
use crate::security::{CounterStore, InMemoryCounterStore};

/// Rate-limit scope for session endpoints that need no token.
pub const AUTH_SCOPE: &str = "auth";
/// Rate-limit scope for signed-in user endpoints.
pub const API_SCOPE: &str = "api";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub notifications: NotificationStore,
    pub limiter: Arc<RateLimiter>,
    /// Live quotas; replaced wholesale on config reload.
    pub rate_limits: Arc<ArcSwap<RateLimitConfig>>,
    pub auth: Arc<AuthConfig>,
    pub notification_config: Arc<NotificationConfig>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        repository: Arc<dyn NotificationRepository>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let verifier = TokenVerifier::new(config.auth.jwt_secret.as_bytes());

        Self {
            gate: Arc::new(AuthorizationGate::new(verifier)),
            notifications: NotificationStore::new(repository),
            limiter: Arc::new(RateLimiter::new(counters)),
            rate_limits: Arc::new(ArcSwap::from_pointee(config.rate_limit.clone())),
            auth: Arc::new(config.auth.clone()),
            notification_config: Arc::new(config.notifications.clone()),
        }
    }

    /// Rate-limit middleware state for one scope.
    pub fn rate_limit_gate(&self, scope: &'static str) -> RateLimitGate {
        RateLimitGate::new(self.limiter.clone(), self.rate_limits.clone(), scope)
    }

    /// Page size for a user listing: the default when absent, capped at the maximum.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.notification_config.default_limit)
            .min(self.notification_config.max_limit)
    }

    /// Apply the reloadable parts of a new configuration.
    pub fn apply_config(&self, config: &AppConfig) {
        self.rate_limits.store(Arc::new(config.rate_limit.clone()));
        tracing::info!(
            enabled = config.rate_limit.enabled,
            scopes = config.rate_limit.scopes.len(),
            "Rate limit quotas reloaded"
        );
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let authenticated = AuthLayerState::authenticated(state.gate.clone(), &state.auth.cookie_name);

    // route_layer: the last one added runs first, so throttling precedes the token check.
    let session = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications/unread-count", get(handlers::unread_count))
        .route("/api/notifications/{id}/read", patch(handlers::mark_read))
        .route_layer(middleware::from_fn_with_state(authenticated, require_auth))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit_gate(API_SCOPE),
            rate_limit_middleware,
        ));

    let public = Router::new()
        .route("/api/auth/logout", post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit_gate(AUTH_SCOPE),
            rate_limit_middleware,
        ));

    let admin = setup_admin_router(&state);

    let router = Router::new()
        .route("/health", get(handlers::health))
        .merge(session)
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                .layer(middleware::from_fn(metrics::track_requests))
                .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
        );

    if config.security.enable_headers {
        with_security_headers(router)
    } else {
        router
    }
}

/// HTTP server for the admission service.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server backed by an empty in-memory notification repository.
    pub fn new(config: AppConfig) -> Self {
        Self::with_repository(config, Arc::new(InMemoryNotificationRepository::new(None)))
    }

    /// Create a server over the given notification repository.
    pub fn with_repository(config: AppConfig, repository: Arc<dyn NotificationRepository>) -> Self {
        let state = AppState::new(&config, repository, Arc::new(InMemoryCounterStore::new()));
        let router = build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A clone of the router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` are applied live.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = tokio::spawn(run_sweeper(
            self.state.limiter.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            shutdown.resubscribe(),
        ));

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => reload_state.apply_config(&config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Rate limit sweeper task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
