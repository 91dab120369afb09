//! Authorization gate: token verification plus role membership.

use thiserror::Error;

use crate::auth::token::{Principal, TokenVerifier};

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token, or the token failed verification.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Valid token without the required role.
    #[error("forbidden")]
    Forbidden,
}

impl AuthError {
    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
        }
    }
}

/// Admits or denies a caller from its token. Side-effect free.
pub struct AuthorizationGate {
    verifier: TokenVerifier,
}

impl AuthorizationGate {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }

    /// Admit any caller holding a valid token.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        let Some(token) = token else {
            tracing::debug!("No identity token presented");
            return Err(AuthError::Unauthenticated);
        };

        self.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Identity token rejected");
            AuthError::Unauthenticated
        })
    }

    /// Admit a caller whose token carries `required_role`.
    pub fn authorize(&self, token: Option<&str>, required_role: &str) -> Result<Principal, AuthError> {
        let principal = self.authenticate(token)?;
        if principal.has_role(required_role) {
            Ok(principal)
        } else {
            tracing::debug!(
                user_id = %principal.user_id,
                required_role,
                "Caller lacks required role"
            );
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{TokenIssuer, TokenSubject};
    use std::time::Duration;

    const SECRET: &[u8] = b"gate-secret-gate-secret-gate-secret";
    const ROLES: [&str; 3] = ["SUPERADMIN", "EDITOR", "REGISTRADOR"];

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(TokenVerifier::new(SECRET))
    }

    fn token_with(roles: &[&str]) -> String {
        TokenIssuer::new(SECRET, Duration::from_secs(300))
            .issue(&TokenSubject::new("u1", roles.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_missing_token_is_unauthenticated() {
        assert_eq!(gate().authenticate(None), Err(AuthError::Unauthenticated));
        assert_eq!(
            gate().authorize(None, "SUPERADMIN"),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_invalid_token_is_unauthenticated() {
        assert_eq!(
            gate().authorize(Some("garbage"), "EDITOR"),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn test_editor_cannot_act_as_superadmin() {
        let token = token_with(&["EDITOR"]);
        assert_eq!(
            gate().authorize(Some(&token), "SUPERADMIN"),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn test_superadmin_does_not_imply_other_roles() {
        let token = token_with(&["SUPERADMIN"]);
        assert_eq!(
            gate().authorize(Some(&token), "EDITOR"),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn test_admission_matches_membership_over_power_set() {
        let gate = gate();
        let required = ["SUPERADMIN", "EDITOR", "REGISTRADOR", "ADMIN", "superadmin"];

        for mask in 0..(1u32 << ROLES.len()) {
            let held: Vec<&str> = ROLES
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, r)| *r)
                .collect();
            let token = token_with(&held);

            for role in required {
                let result = gate.authorize(Some(&token), role);
                if held.contains(&role) {
                    let principal = result.unwrap();
                    assert_eq!(principal.roles.len(), held.len());
                } else {
                    assert_eq!(result, Err(AuthError::Forbidden), "held={held:?} role={role}");
                }
            }
        }
    }

    #[test]
    fn test_authorize_is_idempotent() {
        let gate = gate();
        let token = token_with(&["EDITOR"]);
        let first = gate.authorize(Some(&token), "EDITOR").unwrap();
        let second = gate.authorize(Some(&token), "EDITOR").unwrap();
        assert_eq!(first, second);
    }
}
