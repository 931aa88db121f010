//! Domain types for the sample store.
//!
//! Entries are decoded from upstream GraphQL rows at the fetch-cycle
//! boundary; untyped JSON never crosses into the store.

use serde::{Deserialize, Serialize};

/// One HTTP-overview measurement group for a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpRequestEntry {
    /// Zone display name (not the id).
    pub zone: String,
    /// Unix timestamp (seconds) of the query window start.
    pub captured_at: i64,
    /// Client country name.
    pub country: String,
    /// Edge response status code.
    pub status: u16,
    pub requests: u64,
    pub bytes: u64,
    pub cached_requests: u64,
    pub cached_bytes: u64,
}

/// One firewall-event measurement group for a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirewallEventEntry {
    pub zone: String,
    /// Unix timestamp (seconds) of the query window start.
    pub captured_at: i64,
    /// Mitigation action taken (block, challenge, ...).
    pub action: String,
    pub rule_id: String,
    /// Originating security product.
    pub source: String,
    pub count: u64,
}

/// A normalized, timestamped measurement ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MetricEntry {
    Http(HttpRequestEntry),
    Firewall(FirewallEventEntry),
}

/// Latest enterprise zone quota reading. Replaced wholesale on every
/// successful quota fetch; no history is kept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QuotaSnapshot {
    pub max: f64,
    pub current: f64,
    pub available: f64,
    /// Unix timestamp (seconds) the quota was captured at.
    pub captured_at: i64,
}

/// Account the exporter is scoped to. Set once at startup; later
/// updates with the same values are idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountIdentity {
    pub name: String,
    pub id: String,
}

/// Consistent point-in-time copy of the store, taken under a single
/// critical section.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub http: Vec<HttpRequestEntry>,
    pub firewall: Vec<FirewallEventEntry>,
    pub quota: Option<QuotaSnapshot>,
    pub identity: Option<AccountIdentity>,
    /// Cumulative count of exhausted-retry upstream failures.
    pub scrape_errors: u64,
}
