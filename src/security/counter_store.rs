//! Keyed attempt counters backing the rate limiter.
//!
//! The limiter's algorithm only needs an atomic read-modify-write per key,
//! so the storage is a trait: the in-process [`InMemoryCounterStore`] is the
//! default, and a shared store can be plugged in for multi-instance
//! deployments without touching the algorithm.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

/// Attempt counter for one key within one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub key: String,
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

impl RateRecord {
    /// A window is over once `now` is strictly past its reset instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_reset_at
    }
}

/// Outcome of an update step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterWrite {
    /// Leave the stored record as it is (or absent).
    Keep,
    /// Store this record under the key, replacing any previous one.
    Put(RateRecord),
}

/// Storage for rate-limit counters.
///
/// `update` must run `step` and apply its result atomically with respect to
/// other updates of the same key; two concurrent callers must never both
/// observe the same record.
pub trait CounterStore: Send + Sync {
    fn update(&self, key: &str, step: &mut dyn FnMut(Option<&RateRecord>) -> CounterWrite);

    fn get(&self, key: &str) -> Option<RateRecord>;

    fn remove(&self, key: &str) -> Option<RateRecord>;

    /// Drop every record whose window is over. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store.
///
/// State is lost on restart and is not shared between processes.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    records: DashMap<String, RateRecord>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn update(&self, key: &str, step: &mut dyn FnMut(Option<&RateRecord>) -> CounterWrite) {
        // The entry guard holds the shard lock until the write is applied.
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if let CounterWrite::Put(record) = step(Some(entry.get())) {
                    entry.insert(record);
                }
            }
            Entry::Vacant(entry) => {
                if let CounterWrite::Put(record) = step(None) {
                    entry.insert(record);
                }
            }
        }
    }

    fn get(&self, key: &str) -> Option<RateRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    fn remove(&self, key: &str) -> Option<RateRecord> {
        self.records.remove(key).map(|(_, record)| record)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record(key: &str, count: u32, reset: DateTime<Utc>) -> RateRecord {
        RateRecord {
            key: key.to_string(),
            count,
            window_reset_at: reset,
        }
    }

    #[test]
    fn test_update_insert_and_keep() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();

        store.update("a", &mut |current| {
            assert!(current.is_none());
            CounterWrite::Put(record("a", 1, now))
        });
        assert_eq!(store.get("a").unwrap().count, 1);

        store.update("a", &mut |current| {
            assert_eq!(current.unwrap().count, 1);
            CounterWrite::Keep
        });
        assert_eq!(store.get("a").unwrap().count, 1);

        // Keep on a vacant key does not create a record.
        store.update("b", &mut |_| CounterWrite::Keep);
        assert!(store.get("b").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryCounterStore::new();
        let now = Utc::now();
        store.update("old", &mut |_| {
            CounterWrite::Put(record("old", 3, now - TimeDelta::seconds(1)))
        });
        store.update("live", &mut |_| {
            CounterWrite::Put(record("live", 1, now + TimeDelta::seconds(60)))
        });

        assert_eq!(store.purge_expired(now), 1);
        assert!(store.get("old").is_none());
        assert!(store.get("live").is_some());
        assert!(!store.is_empty());
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        let r = record("k", 1, now);
        assert!(!r.is_expired(now));
        assert!(r.is_expired(now + TimeDelta::milliseconds(1)));
    }
}
