//! Request authentication and authorization.
//!
//! # Data Flow
//! ```text
//! Cookie `auth-token`
//!     → middleware.rs (extract cookie)
//!     → gate.rs (verify via token.rs, check role)
//!     → Principal in request extensions
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Roles are a flat set with exact-match semantics
//! - Verification is pure: no revocation list, no shared mutable state
//! - Denial is a `Result::Err` value mapped to 401/403 at the boundary

pub mod gate;
pub mod middleware;
pub mod token;

pub use gate::{AuthError, AuthorizationGate};
pub use middleware::{require_auth, token_from_cookies, AuthLayerState};
pub use token::{Principal, TokenClaims, TokenError, TokenIssuer, TokenSubject, TokenVerifier};
