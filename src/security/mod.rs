//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-scope, per-client fixed window)
//!     → auth (token verification + role gate)
//!     → Pass to handler
//! Outgoing response:
//!     → headers.rs (nosniff, frame options, no-store)
//! ```
//!
//! # Design Decisions
//! - Denials are values (`RateDecision`), not errors
//! - Counter storage is a trait so instances can share quota
//! - No trust in client-supplied forwarding headers unless configured

pub mod client;
pub mod counter_store;
pub mod headers;
pub mod rate_limit;

pub use counter_store::{CounterStore, InMemoryCounterStore, RateRecord};
pub use rate_limit::{RateDecision, RateLimitGate, RateLimiter};
