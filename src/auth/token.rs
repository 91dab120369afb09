//! Identity token signing and verification.
//!
//! Tokens are HS256 JWTs. The claim names (`userId`, `companyId`, `roles`,
//! `subscriptionStatus`, `iat`, `exp`) are shared with the web front end, so
//! they must not change.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a token was rejected. Every variant means "invalid token" to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// Wire-format claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    /// Required: a token without a role list is rejected, never defaulted.
    pub roles: Vec<String>,
    #[serde(default)]
    pub subscription_status: Option<String>,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiration (Unix seconds).
    pub exp: i64,
}

/// Authenticated identity for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub roles: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub company_id: Option<String>,
    pub subscription_status: Option<String>,
}

impl Principal {
    /// Exact membership; role names carry no hierarchy.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl TryFrom<TokenClaims> for Principal {
    type Error = TokenError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        if claims.user_id.trim().is_empty() {
            return Err(TokenError::Malformed("empty userId".into()));
        }
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TokenError::Malformed("iat out of range".into()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Malformed("exp out of range".into()))?;

        Ok(Self {
            user_id: claims.user_id,
            roles: claims.roles.into_iter().collect(),
            issued_at,
            expires_at,
            company_id: claims.company_id,
            subscription_status: claims.subscription_status,
        })
    }
}

/// Verifies tokens and decodes them into principals. Holds no mutable state.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        Principal::try_from(data.claims)
    }
}

/// Who a new token is for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: String,
    pub roles: Vec<String>,
    pub company_id: Option<String>,
    pub subscription_status: Option<String>,
}

impl TokenSubject {
    pub fn new<I, S>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Signs tokens with a fixed lifetime.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: &TokenSubject, now: DateTime<Utc>) -> Result<String, TokenError> {
        let ttl = TimeDelta::from_std(self.ttl)
            .map_err(|e| TokenError::Signing(format!("ttl out of range: {e}")))?;
        self.sign(&TokenClaims {
            user_id: subject.user_id.clone(),
            company_id: subject.company_id.clone(),
            roles: subject.roles.clone(),
            subscription_status: subject.subscription_status.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        })
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
