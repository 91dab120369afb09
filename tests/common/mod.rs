//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use contest_admission::auth::{TokenIssuer, TokenSubject};
use contest_admission::config::{AppConfig, QuotaConfig};
use contest_admission::http::{build_router, AppState};
use contest_admission::notifications::{
    InMemoryNotificationRepository, MarkRead, Notification, NotificationKind, NotificationPayload,
    NotificationRepository, NotificationStatus, OwnerQuery, StoreError,
};
use contest_admission::security::InMemoryCounterStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-integration-secret";

/// Defaults with a known secret and roomy quotas.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config
        .rate_limit
        .scopes
        .insert("api".to_string(), QuotaConfig::new(1_000, 60_000));
    config
}

/// Config whose `scope` admits only `max_attempts` per minute.
pub fn config_with_quota(scope: &str, max_attempts: u32) -> AppConfig {
    let mut config = test_config();
    config
        .rate_limit
        .scopes
        .insert(scope.to_string(), QuotaConfig::new(max_attempts, 60_000));
    config
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(SECRET.as_bytes(), Duration::from_secs(3600))
}

pub fn mint(user_id: &str, roles: &[&str]) -> String {
    issuer()
        .issue(&TokenSubject::new(user_id, roles.iter().copied()))
        .unwrap()
}

/// A token that expired an hour ago.
pub fn expired(user_id: &str) -> String {
    let issued = Utc::now() - chrono::TimeDelta::hours(2);
    issuer()
        .issue_at(&TokenSubject::new(user_id, ["EDITOR"]), issued)
        .unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repository: Arc<InMemoryNotificationRepository>,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        let repository = Arc::new(InMemoryNotificationRepository::new(None));
        let shared: Arc<dyn NotificationRepository> = repository.clone();
        let state = AppState::new(&config, shared, Arc::new(InMemoryCounterStore::new()));
        let router = build_router(&config, state.clone());
        Self {
            router,
            state,
            repository,
        }
    }

    pub async fn seed(&self, user_id: &str, title: &str) -> Notification {
        self.repository
            .insert(Notification::new(
                user_id,
                NotificationPayload::new(NotificationKind::System, title, "body"),
                Utc::now(),
            ))
            .await
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Router over a repository that fails every call.
pub fn failing_app(config: AppConfig) -> Router {
    let state = AppState::new(
        &config,
        Arc::new(FailingRepository),
        Arc::new(InMemoryCounterStore::new()),
    );
    build_router(&config, state)
}

pub fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    request_from(method, uri, token, "10.0.0.1:40000".parse().unwrap())
}

/// Request as if it arrived from `peer`.
pub fn request_from(
    method: Method,
    uri: &str,
    token: Option<&str>,
    peer: SocketAddr,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("auth-token={token}"));
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("auth-token={token}"));
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>("10.0.0.1:40000".parse().unwrap()));
    request
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub struct FailingRepository;

fn down() -> StoreError {
    StoreError::Unavailable("database offline".into())
}

#[async_trait]
impl NotificationRepository for FailingRepository {
    async fn insert(&self, _: Notification) -> Result<Notification, StoreError> {
        Err(down())
    }

    async fn find_by_id(&self, _: &str) -> Result<Option<Notification>, StoreError> {
        Err(down())
    }

    async fn find_by_owner(&self, _: &str, _: OwnerQuery) -> Result<Vec<Notification>, StoreError> {
        Err(down())
    }

    async fn count_by_owner(&self, _: &str, _: NotificationStatus) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn mark_read(&self, _: &str, _: DateTime<Utc>) -> Result<Option<MarkRead>, StoreError> {
        Err(down())
    }

    async fn find_recent(&self, _: usize) -> Result<Vec<Notification>, StoreError> {
        Err(down())
    }

    async fn count_all(&self, _: Option<NotificationStatus>) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn mark_all_read(&self, _: Option<&str>, _: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(down())
    }
}
