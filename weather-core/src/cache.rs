//! Session-scoped snapshot cache.
//!
//! Entries live in memory as JSON strings under `weather_cache_<city>` keys,
//! the same layout the browser build keeps in session storage. Nothing is
//! written to disk, so residency ends with the process.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use tracing::{debug, warn};

use crate::model::{CacheEntry, WeatherSnapshot};

/// Default time-to-live: ten minutes.
pub const DEFAULT_TTL: Duration = Duration::from_millis(600_000);

const KEY_PREFIX: &str = "weather_cache_";

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_epoch_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_epoch_ms: i64) -> Self {
        Self { now: Arc::new(AtomicI64::new(start_epoch_ms)) }
    }

    pub fn set(&self, epoch_ms: i64) {
        self.now.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Trim and lowercase a city as typed by the user.
pub fn normalize(city_input: &str) -> String {
    city_input.trim().to_lowercase()
}

/// Storage key for an already-normalized city.
pub fn storage_key(city_key: &str) -> String {
    format!("{KEY_PREFIX}{city_key}")
}

#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, String>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, Arc::new(SystemClock))
    }
}

impl CacheStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: HashMap::new(), ttl, clock }
    }

    /// Fresh snapshot for `city_key`, if any. Stale or unreadable entries are
    /// removed before returning `None`.
    pub fn get(&mut self, city_key: &str) -> Option<WeatherSnapshot> {
        let key = storage_key(city_key);
        let raw = self.entries.get(&key)?;

        let entry: CacheEntry = match serde_json::from_str(raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%key, error = %err, "dropping unreadable cache entry");
                self.entries.remove(&key);
                return None;
            }
        };

        let age = entry.age_ms(self.clock.now_epoch_ms());
        if age < self.ttl.as_millis() as i64 {
            debug!(%key, age_ms = age, "cache hit");
            Some(entry.snapshot)
        } else {
            debug!(%key, age_ms = age, "evicting stale cache entry");
            self.entries.remove(&key);
            None
        }
    }

    /// Store `snapshot` stamped with the current time, replacing any entry.
    pub fn put(&mut self, city_key: &str, snapshot: WeatherSnapshot) {
        let entry = CacheEntry { snapshot, fetched_at_epoch_ms: self.clock.now_epoch_ms() };
        let key = storage_key(city_key);

        match serde_json::to_string(&entry) {
            Ok(raw) => {
                self.entries.insert(key, raw);
            }
            Err(err) => warn!(%key, error = %err, "could not serialize cache entry"),
        }
    }

    pub fn remove(&mut self, city_key: &str) -> bool {
        self.entries.remove(&storage_key(city_key)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn insert_raw(&mut self, city_key: &str, raw: &str) {
        self.entries.insert(storage_key(city_key), raw.to_string());
    }
}
