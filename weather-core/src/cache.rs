use std::{collections::HashMap, time::Duration};

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::model::Weather;

/// Key-value store for the latest normalized result per city.
///
/// Lookups on absent keys report `None`; there are no error conditions.
pub trait MeasurementCache: Send + Sync {
    /// Value for `key` only while it is within the freshness window.
    fn get_fresh(&self, key: &str) -> Option<Weather>;

    /// Value for `key` regardless of its age.
    fn get_stale(&self, key: &str) -> Option<Weather>;

    /// Overwrite the entry for `key`, stamping it with the current time.
    fn set(&self, key: &str, value: Weather);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: Weather,
    created_at: Instant,
}

/// In-process cache guarded by a single reader/writer lock.
///
/// Entries are never evicted: once they age past the freshness window they
/// remain available to [`MeasurementCache::get_stale`].
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    freshness_window: Duration,
}

impl MemoryCache {
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness_window,
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MeasurementCache for MemoryCache {
    fn get_fresh(&self, key: &str) -> Option<Weather> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;

        (entry.created_at.elapsed() <= self.freshness_window).then_some(entry.value)
    }

    fn get_stale(&self, key: &str) -> Option<Weather> {
        self.entries.read().get(key).map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: Weather) {
        let entry = Entry {
            value,
            created_at: Instant::now(),
        };
        self.entries.write().insert(key.to_owned(), entry);
    }
}
