//! One collection pass over all zone × dataset pairs.
//!
//! The cycle evicts stale entries, walks the pairs in fixed
//! dataset-major order, normalizes result rows into typed entries at
//! the decode boundary, and finishes with a quota refresh. A single
//! pair's failure is logged and never aborts the rest of the cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use cf_store::{FirewallEventEntry, HttpRequestEntry, MetricEntry, QuotaSnapshot, SampleStore};

use crate::client::{Account, AnalyticsApi};
use crate::datasets::{Dataset, DatasetScope, FREE_PLAN_ID};
use crate::error::FetchError;

/// Retry attempts per analytics query.
const MAX_ATTEMPTS: u32 = 3;

/// The time window one fetch cycle queries, truncated to whole minutes
/// and formatted with a literal `Z` offset for the Cloudflare API.
#[derive(Debug, Clone, Copy)]
pub struct QueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl QueryWindow {
    /// Window ending now, spanning one scrape delay.
    pub fn current(scrape_delay: Duration) -> Self {
        Self::at(Utc::now(), scrape_delay)
    }

    /// Window against an explicit clock, for deterministic tests.
    pub fn at(now: DateTime<Utc>, scrape_delay: Duration) -> Self {
        let delay = chrono::Duration::seconds(scrape_delay.as_secs() as i64);
        Self {
            start: round_down_minute(now - delay),
            end: round_down_minute(now),
        }
    }

    pub fn start_str(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn end_str(&self) -> String {
        format_timestamp(self.end)
    }

    /// Unix timestamp (seconds) entries of this window are stamped with.
    pub fn start_epoch(&self) -> i64 {
        self.start.timestamp()
    }

    #[cfg(test)]
    pub(crate) fn fixed_for_tests() -> Self {
        let now: DateTime<Utc> = "2024-03-08T12:34:56.000789Z".parse().unwrap();
        Self::at(now, Duration::from_secs(60))
    }
}

/// Truncate to minute precision (seconds and sub-seconds to zero).
pub fn round_down_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// How one zone × dataset pair ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Entries were normalized and appended.
    Appended(usize),
    /// Free-tier zone, dataset not in the free-allowed set.
    SkippedFreeTier,
    /// The response carried an application-level error payload.
    SkippedApiErrors,
    /// The query succeeded but returned zero rows.
    SkippedEmpty,
    /// No normalizer is defined for the dataset's row shape.
    SkippedUnknownDataset,
}

/// Executes one full collection pass for an (account, zones, datasets)
/// triple against a shared sample store.
pub struct FetchCycle<C> {
    client: Arc<C>,
    store: SampleStore,
    account: Account,
    zones: Vec<String>,
    datasets: Vec<Dataset>,
    scrape_delay: Duration,
}

impl<C: AnalyticsApi> FetchCycle<C> {
    pub fn new(
        client: Arc<C>,
        store: SampleStore,
        account: Account,
        zones: Vec<String>,
        datasets: Vec<Dataset>,
        scrape_delay: Duration,
    ) -> Self {
        Self {
            client,
            store,
            account,
            zones,
            datasets,
            scrape_delay,
        }
    }

    /// Run one cycle: evict, fetch all pairs, refresh quota.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Retention is twice the scrape delay so a render mid-cycle
        // never sees a gap between two successive cycles.
        self.store.evict_older_than(self.scrape_delay * 2);

        let window = QueryWindow::current(self.scrape_delay);
        self.store
            .set_identity(&self.account.name, &self.account.id);

        for dataset in &self.datasets {
            for zone in &self.zones {
                if let Err(e) = self.fetch_pair(*dataset, zone, &window).await {
                    error!(
                        dataset = dataset.key(),
                        zone = %zone,
                        error = %e,
                        "failed to process metrics"
                    );
                }
            }
        }

        self.fetch_quota(&window).await;
        Ok(())
    }

    /// Fetch and store one zone × dataset pair.
    pub async fn fetch_pair(
        &self,
        dataset: Dataset,
        zone_id: &str,
        window: &QueryWindow,
    ) -> Result<PairOutcome, FetchError> {
        let zone_name = self
            .client
            .zone_name(zone_id)
            .await
            .map_err(FetchError::ZoneMetadata)?;
        let plan = self
            .client
            .zone_plan(zone_id)
            .await
            .map_err(FetchError::ZoneMetadata)?;

        if plan == FREE_PLAN_ID && !dataset.free_tier_allowed() {
            info!(
                zone = %zone_name,
                dataset = dataset.key(),
                "zone is on the free plan, skipping dataset"
            );
            return Ok(PairOutcome::SkippedFreeTier);
        }

        info!(zone = %zone_name, dataset = dataset.key(), "fetching metrics");

        let variables = dataset.variables(zone_id, &self.account.id, window);
        let response = self.query_with_retry(dataset.query(), variables).await?;

        let rows = match extract_rows(&response, dataset) {
            RowExtract::Errors(messages) => {
                error!(zone = %zone_name, dataset = dataset.key(), ?messages, "GraphQL errors");
                return Ok(PairOutcome::SkippedApiErrors);
            }
            RowExtract::Rows(rows) => rows,
        };

        if rows.is_empty() {
            info!(zone = %zone_name, dataset = dataset.key(), "no data returned");
            return Ok(PairOutcome::SkippedEmpty);
        }

        let entries = match normalize_rows(dataset, &rows, &zone_name, window.start_epoch()) {
            Some(entries) => entries?,
            None => {
                warn!(dataset = dataset.key(), "unsupported dataset type");
                return Ok(PairOutcome::SkippedUnknownDataset);
            }
        };

        let appended = entries.len();
        self.store.append(entries);
        info!(
            zone = %zone_name,
            dataset = dataset.key(),
            entries = appended,
            "metrics generated"
        );
        Ok(PairOutcome::Appended(appended))
    }

    /// Issue the analytics query with up to [`MAX_ATTEMPTS`] attempts
    /// and exponential backoff (1 s, 2 s). Exhaustion increments the
    /// store's error counter and fails only this pair.
    async fn query_with_retry(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<Value, FetchError> {
        let mut attempt = 0;
        loop {
            match self.client.query_analytics(query, variables.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        self.store.increment_errors();
                        return Err(FetchError::RetriesExhausted {
                            attempts: MAX_ATTEMPTS,
                            source: e,
                        });
                    }
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                }
            }
        }
    }

    /// Refresh the enterprise zone quota. Failure leaves the last
    /// known value in place and is never fatal to the cycle.
    async fn fetch_quota(&self, window: &QueryWindow) {
        match self.client.account_quota(&self.account.id).await {
            Ok(quota) => {
                self.store.set_quota(QuotaSnapshot {
                    max: quota.max,
                    current: quota.current,
                    available: quota.available,
                    captured_at: window.start_epoch(),
                });
                debug!("updated enterprise zone quota");
            }
            Err(e) => {
                error!(error = %e, "failed to fetch enterprise zone quota");
            }
        }
    }
}

enum RowExtract {
    Errors(Vec<String>),
    Rows(Vec<Value>),
}

/// Pull the dataset's result rows out of a GraphQL response envelope.
fn extract_rows(response: &Value, dataset: Dataset) -> RowExtract {
    if let Some(errors) = response["errors"].as_array() {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|e| {
                    e["message"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return RowExtract::Errors(messages);
        }
    }

    let container = match dataset.scope() {
        DatasetScope::Zone => &response["data"]["viewer"]["zones"][0],
        DatasetScope::Account => &response["data"]["viewer"]["accounts"][0],
    };
    let rows = container[dataset.key()]
        .as_array()
        .cloned()
        .unwrap_or_default();
    RowExtract::Rows(rows)
}

#[derive(Deserialize)]
struct HttpRow {
    dimensions: HttpDimensions,
    sum: HttpSums,
}

#[derive(Deserialize)]
struct HttpDimensions {
    #[serde(rename = "clientCountryName")]
    client_country_name: String,
    #[serde(rename = "edgeResponseStatus")]
    edge_response_status: u16,
}

#[derive(Deserialize)]
struct HttpSums {
    requests: u64,
    bytes: u64,
    #[serde(rename = "cachedRequests")]
    cached_requests: u64,
    #[serde(rename = "cachedBytes")]
    cached_bytes: u64,
}

#[derive(Deserialize)]
struct FirewallRow {
    dimensions: FirewallDimensions,
    count: u64,
}

#[derive(Deserialize)]
struct FirewallDimensions {
    action: String,
    #[serde(rename = "ruleId")]
    rule_id: String,
    source: String,
}

/// Normalize raw rows into typed entries. Returns `None` when the
/// dataset has no known row shape.
fn normalize_rows(
    dataset: Dataset,
    rows: &[Value],
    zone_name: &str,
    captured_at: i64,
) -> Option<Result<Vec<MetricEntry>, FetchError>> {
    let decode = |source| FetchError::Decode {
        dataset: dataset.key(),
        source,
    };
    match dataset {
        Dataset::HttpRequestsOverview => Some(
            rows.iter()
                .map(|row| {
                    let row: HttpRow =
                        serde_json::from_value(row.clone()).map_err(decode)?;
                    Ok(MetricEntry::Http(HttpRequestEntry {
                        zone: zone_name.to_string(),
                        captured_at,
                        country: row.dimensions.client_country_name,
                        status: row.dimensions.edge_response_status,
                        requests: row.sum.requests,
                        bytes: row.sum.bytes,
                        cached_requests: row.sum.cached_requests,
                        cached_bytes: row.sum.cached_bytes,
                    }))
                })
                .collect(),
        ),
        Dataset::FirewallEvents => Some(
            rows.iter()
                .map(|row| {
                    let row: FirewallRow =
                        serde_json::from_value(row.clone()).map_err(decode)?;
                    Ok(MetricEntry::Firewall(FirewallEventEntry {
                        zone: zone_name.to_string(),
                        captured_at,
                        action: row.dimensions.action,
                        rule_id: row.dimensions.rule_id,
                        source: row.dimensions.source,
                        count: row.count,
                    }))
                })
                .collect(),
        ),
        Dataset::DnsAnalytics => None,
    }
}
