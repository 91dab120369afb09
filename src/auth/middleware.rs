//! Cookie-based authentication middleware.
//!
//! Reads the identity token from the configured cookie, runs it through the
//! [`AuthorizationGate`], and on success stores the [`Principal`] in the
//! request extensions for handlers to pick up with `Extension<Principal>`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::Cookie;

use crate::auth::gate::AuthorizationGate;
use crate::auth::token::Principal;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Extract the value of cookie `name` from the request headers.
///
/// Every `Cookie` header is searched; unparsable pairs are skipped.
pub fn token_from_cookies(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}

/// State for one protected route group.
#[derive(Clone)]
pub struct AuthLayerState {
    pub gate: Arc<AuthorizationGate>,
    pub cookie_name: Arc<str>,
    /// `None` admits any authenticated caller.
    pub required_role: Option<Arc<str>>,
}

impl AuthLayerState {
    pub fn authenticated(gate: Arc<AuthorizationGate>, cookie_name: &str) -> Self {
        Self {
            gate,
            cookie_name: Arc::from(cookie_name),
            required_role: None,
        }
    }

    pub fn with_role(gate: Arc<AuthorizationGate>, cookie_name: &str, role: &str) -> Self {
        Self {
            gate,
            cookie_name: Arc::from(cookie_name),
            required_role: Some(Arc::from(role)),
        }
    }
}

pub async fn require_auth(
    State(state): State<AuthLayerState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = token_from_cookies(request.headers(), &state.cookie_name);

    let result = match state.required_role.as_deref() {
        Some(role) => state.gate.authorize(token.as_deref(), role),
        None => state.gate.authenticate(token.as_deref()),
    };

    match result {
        Ok(principal) => {
            request.extensions_mut().insert::<Principal>(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::info!(
                path = %request.uri().path(),
                reason = e.as_str(),
                "Request denied"
            );
            metrics::record_auth_denied(e.as_str());
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth-token=abc.def.ghi; lang=es"),
        );
        assert_eq!(
            token_from_cookies(&headers, "auth-token").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(token_from_cookies(&headers, "session"), None);
    }

    #[test]
    fn test_token_from_second_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("auth-token=\"t\""));
        assert_eq!(token_from_cookies(&headers, "auth-token").as_deref(), Some("t"));
    }

    #[test]
    fn test_empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token="));
        assert_eq!(token_from_cookies(&headers, "auth-token"), None);
    }

    #[test]
    fn test_prefix_named_cookie_does_not_match() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("x-auth-token=zzz"));
        assert_eq!(token_from_cookies(&headers, "auth-token"), None);
    }
}
