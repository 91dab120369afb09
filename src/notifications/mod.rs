//! Notification delivery subsystem.
//!
//! # Data Flow
//! ```text
//! producer (admin API / other services)
//!     → store.rs (create)
//!     → repository.rs (NotificationRepository trait)
//!     → memory.rs (DashMap + JSON snapshot)
//!
//! HTTP handlers
//!     → store.rs (list / unread count / mark read)
//! ```
//!
//! # Design Decisions
//! - Status only moves UNREAD → READ; repeated marks are no-ops
//! - Storage is behind an async trait; the in-memory backend is the default
//! - Ownership is enforced by the handler before mutating

pub mod memory;
pub mod repository;
pub mod store;
pub mod types;

pub use memory::InMemoryNotificationRepository;
pub use repository::{MarkRead, NotificationRepository, OwnerQuery, StoreError};
pub use store::{NotificationError, NotificationStore};
pub use types::{Notification, NotificationKind, NotificationPayload, NotificationStatus};
