//! Notification delivery operations.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::notifications::repository::{MarkRead, NotificationRepository, OwnerQuery, StoreError};
use crate::notifications::types::{Notification, NotificationPayload, NotificationStatus};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-user notification listing, unread counts, and read marking.
///
/// Ownership checks are the caller's job: `mark_as_read` acts on any id.
/// Repository failures are returned as-is and never retried here.
#[derive(Clone)]
pub struct NotificationStore {
    repository: Arc<dyn NotificationRepository>,
}

impl NotificationStore {
    pub fn new(repository: Arc<dyn NotificationRepository>) -> Self {
        Self { repository }
    }

    /// A user's notifications, newest first, at most `limit` (`None` = all).
    ///
    /// The unread filter is applied before the limit.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let query = OwnerQuery { unread_only, limit };
        Ok(self.repository.find_by_owner(user_id, query).await?)
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize, NotificationError> {
        Ok(self
            .repository
            .count_by_owner(user_id, NotificationStatus::Unread)
            .await?)
    }

    pub async fn get(&self, id: &str) -> Result<Notification, NotificationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| NotificationError::NotFound(id.to_string()))
    }

    /// Move a notification to READ. Already-read records are returned unchanged.
    pub async fn mark_as_read(&self, id: &str) -> Result<Notification, NotificationError> {
        Ok(self.mark_read_outcome(id).await?.notification)
    }

    /// Like [`mark_as_read`](Self::mark_as_read), also reporting whether this
    /// call performed the transition.
    pub async fn mark_read_outcome(&self, id: &str) -> Result<MarkRead, NotificationError> {
        let outcome = self
            .repository
            .mark_read(id, Utc::now())
            .await?
            .ok_or_else(|| NotificationError::NotFound(id.to_string()))?;

        if outcome.changed {
            tracing::debug!(notification_id = %id, user_id = %outcome.notification.user_id, "Notification marked read");
            metrics::record_marked_read(1);
        }
        Ok(outcome)
    }

    /// Producer entry point: store a new unread notification for `user_id`.
    pub async fn create(
        &self,
        user_id: &str,
        payload: NotificationPayload,
    ) -> Result<Notification, NotificationError> {
        let notification = self
            .repository
            .insert(Notification::new(user_id, payload, Utc::now()))
            .await?;
        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = ?notification.payload.kind,
            "Notification created"
        );
        Ok(notification)
    }

    /// Newest notifications across all users.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.repository.find_recent(limit).await?)
    }

    pub async fn total_count(&self, status: Option<NotificationStatus>) -> Result<usize, NotificationError> {
        Ok(self.repository.count_all(status).await?)
    }

    /// Mark every unread notification read, for one user or for everyone.
    pub async fn mark_all_read(&self, user_id: Option<&str>) -> Result<usize, NotificationError> {
        let changed = self.repository.mark_all_read(user_id, Utc::now()).await?;
        if changed > 0 {
            tracing::info!(user_id = ?user_id, changed, "Bulk marked notifications read");
            metrics::record_marked_read(changed as u64);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::memory::InMemoryNotificationRepository;
    use crate::notifications::types::NotificationKind;
    use chrono::{DateTime, TimeDelta};

    fn payload() -> NotificationPayload {
        NotificationPayload::new(NotificationKind::System, "Aviso", "mensaje")
    }

    async fn seeded() -> (NotificationStore, DateTime<Utc>) {
        let repo = Arc::new(InMemoryNotificationRepository::new(None));
        let t0 = Utc::now() - TimeDelta::hours(1);
        for (i, (id, user)) in [("n1", "u1"), ("n2", "u1"), ("n3", "u1"), ("n4", "u2")]
            .into_iter()
            .enumerate()
        {
            repo.insert(Notification::new(user, payload(), t0 + TimeDelta::minutes(i as i64)).with_id(id))
                .await
                .unwrap();
        }
        (NotificationStore::new(repo), t0)
    }

    #[tokio::test]
    async fn test_mark_as_read_decrements_unread_by_one() {
        let (store, _) = seeded().await;
        assert_eq!(store.unread_count("u1").await.unwrap(), 3);

        let n = store.mark_as_read("n1").await.unwrap();
        assert_eq!(n.status, NotificationStatus::Read);
        assert!(n.read_at.is_some());
        assert_eq!(store.unread_count("u1").await.unwrap(), 2);
        assert_eq!(store.unread_count("u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_marks_report_one_transition() {
        let (store, _) = seeded().await;

        let (a, b) = tokio::join!(store.mark_read_outcome("n3"), store.mark_read_outcome("n3"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a.changed ^ b.changed);
        assert_eq!(a.notification.read_at, b.notification.read_at);
        assert!(!store.mark_read_outcome("n3").await.unwrap().changed);
    }

    #[tokio::test]
    async fn test_mark_as_read_is_idempotent() {
        let (store, _) = seeded().await;
        let first = store.mark_as_read("n2").await.unwrap();
        let second = store.mark_as_read("n2").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.unread_count("u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let (store, _) = seeded().await;
        let err = store.mark_as_read("missing-id").await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(id) if id == "missing-id"));
        assert!(matches!(
            store.get("missing-id").await,
            Err(NotificationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unread_count_matches_unbounded_unread_listing() {
        let (store, _) = seeded().await;
        store.mark_as_read("n3").await.unwrap();

        for user in ["u1", "u2", "nobody"] {
            let listed = store.list_for_user(user, None, true).await.unwrap();
            assert_eq!(store.unread_count(user).await.unwrap(), listed.len());
            assert!(listed.iter().all(|n| n.is_unread() && n.user_id == user));
        }
    }

    #[tokio::test]
    async fn test_listing_newest_first_with_limit() {
        let (store, _) = seeded().await;
        store.mark_as_read("n3").await.unwrap();

        let all: Vec<_> = store
            .list_for_user("u1", Some(10), false)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(all, vec!["n3", "n2", "n1"]);

        // Filter first, then limit: the newest unread is n2, not the read n3.
        let unread: Vec<_> = store
            .list_for_user("u1", Some(1), true)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(unread, vec!["n2"]);

        assert!(store.list_for_user("u1", Some(0), false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mark_as_read_both_see_read() {
        let (store, _) = seeded().await;
        let (a, b) = tokio::join!(store.mark_as_read("n1"), store.mark_as_read("n1"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.status, NotificationStatus::Read);
        assert_eq!(b.status, NotificationStatus::Read);
        assert_eq!(a.read_at, b.read_at);
        assert_eq!(store.unread_count("u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_and_bulk_mark() {
        let (store, _) = seeded().await;
        let created = store.create("u2", payload()).await.unwrap();
        assert!(created.is_unread());
        assert_eq!(store.unread_count("u2").await.unwrap(), 2);

        assert_eq!(store.mark_all_read(Some("u2")).await.unwrap(), 2);
        assert_eq!(store.unread_count("u2").await.unwrap(), 0);
        assert_eq!(store.total_count(Some(NotificationStatus::Unread)).await.unwrap(), 3);

        let recent = store.list_recent(2).await.unwrap();
        assert_eq!(recent[0].id, created.id);
        assert_eq!(recent.len(), 2);
    }
}
