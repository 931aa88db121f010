//! The sample store.
//!
//! A single coarse mutex guards all mutable state. Contention is low
//! (one fetch cycle writing, the scrape handler reading) and every
//! critical section is a short in-memory copy or mutate; the lock is
//! never held across I/O or an await point.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::types::{
    AccountIdentity, FirewallEventEntry, HttpRequestEntry, MetricEntry, QuotaSnapshot,
    StoreSnapshot,
};

#[derive(Debug, Default)]
struct Inner {
    http: Vec<HttpRequestEntry>,
    firewall: Vec<FirewallEventEntry>,
    quota: Option<QuotaSnapshot>,
    identity: Option<AccountIdentity>,
    scrape_errors: u64,
}

/// Thread-safe, additive store of timestamped analytics entries.
///
/// Cloning the store clones the handle; all clones share one inner
/// state, preserving the single-instance-per-process semantics.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    inner: Arc<Mutex<Inner>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries, routing each to its variant's collection.
    ///
    /// Entries accumulate across fetch cycles until evicted; an append
    /// never replaces prior data.
    pub fn append(&self, entries: Vec<MetricEntry>) {
        let mut inner = self.lock();
        for entry in entries {
            match entry {
                MetricEntry::Http(e) => inner.http.push(e),
                MetricEntry::Firewall(e) => inner.firewall.push(e),
            }
        }
    }

    /// Take a consistent point-in-time copy of everything the renderer
    /// needs. A quota or identity update concurrent with an entry
    /// append can never be observed half-applied.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.lock();
        StoreSnapshot {
            http: inner.http.clone(),
            firewall: inner.firewall.clone(),
            quota: inner.quota,
            identity: inner.identity.clone(),
            scrape_errors: inner.scrape_errors,
        }
    }

    /// Drop entries whose capture time predates `now - max_age`,
    /// independently for each variant collection.
    pub fn evict_older_than(&self, max_age: Duration) {
        self.evict_older_than_at(max_age, epoch_secs());
    }

    /// Eviction against an explicit clock, for deterministic tests.
    pub fn evict_older_than_at(&self, max_age: Duration, now: i64) {
        let max_age = max_age.as_secs() as i64;
        let mut inner = self.lock();
        let before = inner.http.len() + inner.firewall.len();
        inner.http.retain(|e| now - e.captured_at <= max_age);
        inner.firewall.retain(|e| now - e.captured_at <= max_age);
        let after = inner.http.len() + inner.firewall.len();
        if after < before {
            debug!(evicted = before - after, max_age_secs = max_age, "evicted stale entries");
        }
    }

    /// Record one exhausted-retry upstream failure.
    pub fn increment_errors(&self) {
        self.lock().scrape_errors += 1;
    }

    /// Replace the live quota reading.
    pub fn set_quota(&self, quota: QuotaSnapshot) {
        self.lock().quota = Some(quota);
    }

    /// Set the account identity. Idempotent: repeated calls with the
    /// same values leave exactly one identity.
    pub fn set_identity(&self, name: &str, id: &str) {
        self.lock().identity = Some(AccountIdentity {
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a writer panicked mid-mutation; the
        // store's operations are single push/retain/assign steps, so
        // the data is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
