//! Duplicate-suppression cache for fired alerts.

use crate::model::{RuleId, VehicleId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const DEFAULT_CACHE_TIMEOUT_SECS: i64 = 300;

/// A repeat firing within the timeout is suppressed unless the value moved
/// by more than this many percent.
pub const SIGNIFICANT_CHANGE_PCT: f64 = 10.0;

pub type CacheKey = (VehicleId, RuleId);

/// Last value that fired for a (vehicle, rule) pair and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub value: f64,
    pub fired_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether a new firing of `value` at `now` repeats this one.
    ///
    /// Live while `now - fired_at <= timeout`. A cached zero never
    /// suppresses a nonzero value.
    pub fn suppresses(&self, value: f64, now: DateTime<Utc>, timeout: Duration) -> bool {
        if now - self.fired_at > timeout {
            return false;
        }
        if self.value == 0.0 {
            return value == 0.0;
        }
        let change_pct = (value - self.value).abs() * 100.0 / self.value.abs();
        change_pct <= SIGNIFICANT_CHANGE_PCT
    }
}

/// Outcome of [`AlertCache::try_fire`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Firing {
    Suppressed,
    Fired { previous: Option<CacheEntry> },
}

/// TTL-bounded map holding at most one entry per (vehicle, rule).
///
/// All operations take one lock, so check-then-record on a key is atomic.
#[derive(Debug)]
pub struct AlertCache {
    timeout: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl Default for AlertCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_CACHE_TIMEOUT_SECS))
    }
}

impl AlertCache {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: CacheKey) -> Option<CacheEntry> {
        self.entries().get(&key).copied()
    }

    /// Replaces the entry for `key`.
    pub fn put(&self, key: CacheKey, value: f64, fired_at: DateTime<Utc>) {
        self.entries().insert(key, CacheEntry { value, fired_at });
    }

    pub fn remove(&self, key: CacheKey) -> Option<CacheEntry> {
        self.entries().remove(&key)
    }

    /// Records a firing unless it duplicates the cached one.
    ///
    /// Returns true when the firing should raise an alert; the entry is
    /// then replaced. A suppressed firing leaves the entry untouched.
    pub fn record_unless_duplicate(&self, key: CacheKey, value: f64, now: DateTime<Utc>) -> bool {
        matches!(self.try_fire(key, value, now), Firing::Fired { .. })
    }

    /// Like [`record_unless_duplicate`](Self::record_unless_duplicate), but
    /// hands back the replaced entry so a failed alert write can be undone
    /// with [`restore`](Self::restore).
    pub fn try_fire(&self, key: CacheKey, value: f64, now: DateTime<Utc>) -> Firing {
        let mut entries = self.entries();
        if entries
            .get(&key)
            .is_some_and(|entry| entry.suppresses(value, now, self.timeout))
        {
            return Firing::Suppressed;
        }
        let previous = entries.insert(
            key,
            CacheEntry {
                value,
                fired_at: now,
            },
        );
        Firing::Fired { previous }
    }

    /// Undoes a firing recorded as `fired`, putting `previous` back.
    ///
    /// Does nothing if the entry has since been replaced by another firing.
    pub fn restore(&self, key: CacheKey, fired: CacheEntry, previous: Option<CacheEntry>) {
        let mut entries = self.entries();
        if entries.get(&key) != Some(&fired) {
            return;
        }
        match previous {
            Some(entry) => entries.insert(key, entry),
            None => entries.remove(&key),
        };
    }

    /// Drops every entry older than the timeout at `now`.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.fired_at <= self.timeout);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "Alert cache entries evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
