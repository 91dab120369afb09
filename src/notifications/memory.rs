//! In-memory notification repository with optional snapshot persistence.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::notifications::repository::{MarkRead, NotificationRepository, OwnerQuery, StoreError};
use crate::notifications::types::{Notification, NotificationStatus};

/// A stored record plus its insertion sequence (the ordering tie-breaker).
#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    notification: Notification,
}

/// A thread-safe notification store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryNotificationRepository {
    records: DashMap<String, Stored>,
    next_seq: AtomicU64,
    persistence_path: Option<PathBuf>,
}

impl InMemoryNotificationRepository {
    /// Create a new empty repository.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: DashMap::new(),
            next_seq: AtomicU64::new(0),
            persistence_path,
        }
    }

    /// Load from the snapshot file if it exists; later saves go to the same file.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let repo = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            // Snapshots are written in insertion order.
            let notifications: Vec<Notification> = serde_json::from_reader(reader)?;
            for notification in notifications {
                repo.put(notification)?;
            }
            tracing::info!(
                count = repo.records.len(),
                path = %path.display(),
                "Loaded notifications from snapshot"
            );
        }
        Ok(repo)
    }

    /// Write all records to the snapshot file, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let mut stored: Vec<Stored> = self.records.iter().map(|r| r.value().clone()).collect();
        stored.sort_by_key(|s| s.seq);
        let notifications: Vec<Notification> = stored.into_iter().map(|s| s.notification).collect();

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &notifications)?;
        tracing::info!(
            count = notifications.len(),
            path = %path.display(),
            "Saved notifications to snapshot"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn put(&self, notification: Notification) -> Result<Notification, StoreError> {
        match self.records.entry(notification.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(notification.id)),
            Entry::Vacant(entry) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entry.insert(Stored {
                    seq,
                    notification: notification.clone(),
                });
                Ok(notification)
            }
        }
    }

    /// Matching records, newest first with ties in insertion order.
    fn select<F>(&self, filter: F, limit: Option<usize>) -> Vec<Notification>
    where
        F: Fn(&Notification) -> bool,
    {
        let mut matched: Vec<Stored> = self
            .records
            .iter()
            .filter(|r| filter(&r.value().notification))
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by_key(|s| (Reverse(s.notification.created_at), s.seq));
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        matched.into_iter().map(|s| s.notification).collect()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, notification: Notification) -> Result<Notification, StoreError> {
        self.put(notification)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().notification.clone()))
    }

    async fn find_by_owner(&self, user_id: &str, query: OwnerQuery) -> Result<Vec<Notification>, StoreError> {
        Ok(self.select(
            |n| n.user_id == user_id && (!query.unread_only || n.is_unread()),
            query.limit,
        ))
    }

    async fn count_by_owner(&self, user_id: &str, status: NotificationStatus) -> Result<usize, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.value().notification.user_id == user_id && r.value().notification.status == status)
            .count())
    }

    async fn mark_read(&self, id: &str, at: DateTime<Utc>) -> Result<Option<MarkRead>, StoreError> {
        // The write guard makes check-and-set atomic for this id.
        Ok(self.records.get_mut(id).map(|mut r| {
            let changed = r.notification.mark_read(at);
            MarkRead {
                notification: r.notification.clone(),
                changed,
            }
        }))
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Notification>, StoreError> {
        Ok(self.select(|_| true, Some(limit)))
    }

    async fn count_all(&self, status: Option<NotificationStatus>) -> Result<usize, StoreError> {
        Ok(match status {
            Some(status) => self
                .records
                .iter()
                .filter(|r| r.value().notification.status == status)
                .count(),
            None => self.records.len(),
        })
    }

    async fn mark_all_read(&self, user_id: Option<&str>, at: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut changed = 0;
        for mut r in self.records.iter_mut() {
            let owned = user_id.map_or(true, |u| r.notification.user_id == u);
            if owned && r.notification.mark_read(at) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
