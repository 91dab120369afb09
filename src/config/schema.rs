//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the admission
//! service. All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the admission service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Token signing and cookie settings.
    pub auth: AuthConfig,

    /// Rate limiting quotas per endpoint scope.
    pub rate_limit: RateLimitConfig,

    /// Notification listing limits and persistence.
    pub notifications: NotificationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Identity token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify identity tokens.
    /// Overridden by the `JWT_SECRET` environment variable.
    pub jwt_secret: String,

    /// Name of the cookie carrying the identity token.
    pub cookie_name: String,

    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,

    /// Role required for the administrative endpoints.
    pub admin_role: String,

    /// Mark cookies `Secure` (production deployments behind TLS).
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No usable default: the file or JWT_SECRET must supply one.
            jwt_secret: String::new(),
            cookie_name: "auth-token".to_string(),
            token_ttl_secs: 7 * 24 * 60 * 60,
            admin_role: "SUPERADMIN".to_string(),
            secure_cookie: false,
        }
    }
}

/// A single rate-limit quota: attempts allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Maximum admitted attempts per key per window.
    pub max_attempts: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl QuotaConfig {
    pub fn new(max_attempts: u32, window_ms: u64) -> Self {
        Self {
            max_attempts,
            window_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self::new(120, 60_000)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Quota used for scopes without an explicit entry.
    pub default: QuotaConfig,

    /// Per-scope quotas, keyed by scope name ("auth", "api", "admin").
    pub scopes: HashMap<String, QuotaConfig>,

    /// How often expired counters are purged, in seconds.
    pub sweep_interval_secs: u64,

    /// Take the client address from X-Forwarded-For / X-Real-IP.
    /// Only enable behind a trusted reverse proxy.
    pub trust_forwarded_headers: bool,
}

impl RateLimitConfig {
    /// Quota for a scope, falling back to the default quota.
    pub fn quota_for(&self, scope: &str) -> QuotaConfig {
        self.scopes.get(scope).copied().unwrap_or(self.default)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert("auth".to_string(), QuotaConfig::new(5, 15 * 60 * 1000));
        scopes.insert("api".to_string(), QuotaConfig::new(120, 60_000));
        scopes.insert("admin".to_string(), QuotaConfig::new(60, 60_000));

        Self {
            enabled: true,
            default: QuotaConfig::default(),
            scopes,
            sweep_interval_secs: 60,
            trust_forwarded_headers: false,
        }
    }
}

/// Notification listing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Page size when the caller does not pass `limit`.
    pub default_limit: usize,

    /// Upper bound on `limit` accepted from callers.
    pub max_limit: usize,

    /// Snapshot file for the in-memory repository (loaded at start, saved on exit).
    pub persistence_path: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 200,
            persistence_path: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 64 * 1024,
        }
    }
}
