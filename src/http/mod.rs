//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, body limit)
//!     → security::rate_limit (per-scope throttle)
//!     → auth::middleware (cookie token → Principal)
//!     → handlers.rs / admin::handlers
//!     → response.rs (errors → status codes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
