//! Contest admission library: rate limiting, token verification, role gating
//! and per-user notifications behind an Axum router.

pub mod admin;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod notifications;
pub mod observability;
pub mod security;

pub use auth::{AuthorizationGate, Principal, TokenIssuer, TokenVerifier};
pub use config::schema::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use notifications::NotificationStore;
pub use security::RateLimiter;
