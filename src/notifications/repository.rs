//! Storage contract for notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::notifications::types::{Notification, NotificationStatus};

/// Failure inside the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("notification {0} already exists")]
    Duplicate(String),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Filter for per-owner lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnerQuery {
    pub unread_only: bool,
    /// `None` returns every match.
    pub limit: Option<usize>,
}

/// Result of an update-by-id to READ.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRead {
    pub notification: Notification,
    /// False when the record was already read.
    pub changed: bool,
}

/// Persistence collaborator for the notification store.
///
/// Lookups by owner return newest first (`created_at` descending, ties in
/// insertion order). `mark_read` must be atomic per id.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<Notification, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>, StoreError>;

    async fn find_by_owner(&self, user_id: &str, query: OwnerQuery) -> Result<Vec<Notification>, StoreError>;

    async fn count_by_owner(&self, user_id: &str, status: NotificationStatus) -> Result<usize, StoreError>;

    /// `None` when no notification has this id.
    async fn mark_read(&self, id: &str, at: DateTime<Utc>) -> Result<Option<MarkRead>, StoreError>;

    /// Newest notifications across all owners.
    async fn find_recent(&self, limit: usize) -> Result<Vec<Notification>, StoreError>;

    /// Count across all owners, optionally by status.
    async fn count_all(&self, status: Option<NotificationStatus>) -> Result<usize, StoreError>;

    /// Mark every unread notification read, optionally for one owner only.
    async fn mark_all_read(&self, user_id: Option<&str>, at: DateTime<Utc>) -> Result<usize, StoreError>;
}
