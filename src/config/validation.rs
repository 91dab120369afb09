//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (quotas > 0, timeouts > 0, limits ordered)
//! - Validate addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, QuotaConfig};

/// Minimum accepted HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("auth.jwt_secret is not set (use the config file or JWT_SECRET)")]
    MissingSecret,

    #[error("auth.jwt_secret must be at least {} bytes", MIN_SECRET_LEN)]
    WeakSecret,

    #[error("auth.cookie_name must not be empty")]
    EmptyCookieName,

    #[error("auth.admin_role must not be empty")]
    EmptyAdminRole,

    #[error("notifications.default_limit ({default}) exceeds notifications.max_limit ({max})")]
    LimitOrder { default: usize, max: usize },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs".to_string(),
        });
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::MissingSecret);
    } else if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::WeakSecret);
    }
    if config.auth.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }
    if config.auth.admin_role.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminRole);
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "auth.token_ttl_secs".to_string(),
        });
    }

    check_quota("rate_limit.default", &config.rate_limit.default, &mut errors);
    let mut scopes: Vec<_> = config.rate_limit.scopes.iter().collect();
    scopes.sort_by(|a, b| a.0.cmp(b.0));
    for (scope, quota) in scopes {
        check_quota(&format!("rate_limit.scopes.{scope}"), quota, &mut errors);
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "rate_limit.sweep_interval_secs".to_string(),
        });
    }

    let notifications = &config.notifications;
    if notifications.max_limit == 0 {
        errors.push(ValidationError::Zero {
            field: "notifications.max_limit".to_string(),
        });
    }
    if notifications.default_limit == 0 {
        errors.push(ValidationError::Zero {
            field: "notifications.default_limit".to_string(),
        });
    } else if notifications.default_limit > notifications.max_limit {
        errors.push(ValidationError::LimitOrder {
            default: notifications.default_limit,
            max: notifications.max_limit,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_quota(prefix: &str, quota: &QuotaConfig, errors: &mut Vec<ValidationError>) {
    if quota.max_attempts == 0 {
        errors.push(ValidationError::Zero {
            field: format!("{prefix}.max_attempts"),
        });
    }
    if quota.window_ms == 0 {
        errors.push(ValidationError::Zero {
            field: format!("{prefix}.window_ms"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "validation-secret-validation-secret".into();
        config
    }

    #[test]
    fn test_defaults_with_secret_are_valid() {
        assert_eq!(validate_config(&with_secret()), Ok(()));
    }

    #[test]
    fn test_defaults_alone_have_no_secret() {
        assert_eq!(
            validate_config(&AppConfig::default()),
            Err(vec![ValidationError::MissingSecret])
        );
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = with_secret();
        config.listener.bind_address = "not-an-address".into();
        config.auth.jwt_secret = "short".into();
        config.rate_limit.default.max_attempts = 0;
        config
            .rate_limit
            .scopes
            .insert("login".into(), QuotaConfig::new(5, 0));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::WeakSecret));
        assert!(errors.contains(&ValidationError::Zero {
            field: "rate_limit.scopes.login.window_ms".into()
        }));
    }

    #[test]
    fn test_limit_ordering() {
        let mut config = with_secret();
        config.notifications.default_limit = 500;
        config.notifications.max_limit = 100;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::LimitOrder {
                default: 500,
                max: 100
            }]
        );
    }
}
