use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::melon::chart::ChartRecord;

/// Result of the last successful fetch, stored as one immutable snapshot so
/// readers never see records from one cycle with the timestamp of another.
#[derive(Debug, PartialEq)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub records: Vec<ChartRecord>,
}

impl CacheEntry {
    /// Milliseconds since epoch, as exposed in the `updated` field.
    pub fn updated_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

type SharedEntry = Arc<Mutex<Option<Arc<CacheEntry>>>>;

/// Single-slot, time-bounded cache guarding the chart fetch.
#[derive(Clone)]
pub struct ChartCache {
    data: SharedEntry,
    ttl: Duration,
}

impl ChartCache {
    pub fn new(ttl: Duration) -> ChartCache {
        ChartCache {
            data: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True iff an entry exists and is younger than the TTL at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.slot().as_ref() {
            Some(entry) => {
                // A clock going backwards yields a negative age, which still counts as fresh.
                let age_ms = (now - entry.timestamp).num_milliseconds();
                age_ms < i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
            }
            None => false,
        }
    }

    /// Current entry, fresh or not.
    pub fn get(&self) -> Option<Arc<CacheEntry>> {
        self.slot().clone()
    }

    /// Replaces records and timestamp together, last writer wins.
    pub fn put(&self, records: Vec<ChartRecord>, now: DateTime<Utc>) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            timestamp: now,
            records,
        });
        *self.slot() = Some(entry.clone());
        entry
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<CacheEntry>>> {
        // The slot is only ever swapped whole, so a poisoned lock still holds a consistent value.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
