//! Mock upstream client shared by the collector's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{Account, AnalyticsApi, ZoneQuota};
use crate::datasets::{Dataset, DatasetScope};
use crate::error::ClientError;

/// In-memory `AnalyticsApi` with canned responses and failure knobs.
pub(crate) struct MockApi {
    account: Account,
    zones: Vec<String>,
    names: HashMap<String, String>,
    plans: HashMap<String, String>,
    /// Dataset key → full GraphQL envelope.
    responses: HashMap<&'static str, Value>,
    /// zoneTag values whose analytics queries always fail.
    failing_zones: HashSet<String>,
    quota: Option<ZoneQuota>,
    query_calls: AtomicUsize,
    quota_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            account: Account {
                id: "acct-id".to_string(),
                name: "acct".to_string(),
            },
            zones: Vec::new(),
            names: HashMap::new(),
            plans: HashMap::new(),
            responses: HashMap::new(),
            failing_zones: HashSet::new(),
            quota: None,
            query_calls: AtomicUsize::new(0),
            quota_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_zone(mut self, id: &str, name: &str, plan: &str) -> Self {
        self.zones.push(id.to_string());
        self.names.insert(id.to_string(), name.to_string());
        self.plans.insert(id.to_string(), plan.to_string());
        self
    }

    /// Canned result rows for a dataset, wrapped in the envelope shape
    /// the dataset's scope produces.
    pub fn with_response(mut self, dataset: Dataset, rows: Value) -> Self {
        let mut container = serde_json::Map::new();
        container.insert(dataset.key().to_string(), rows);
        let envelope = match dataset.scope() {
            DatasetScope::Zone => json!({
                "data": { "viewer": { "zones": [ container ] } }
            }),
            DatasetScope::Account => json!({
                "data": { "viewer": { "accounts": [ container ] } }
            }),
        };
        self.responses.insert(dataset.key(), envelope);
        self
    }

    /// A verbatim GraphQL envelope (e.g. one carrying `errors`).
    pub fn with_envelope(mut self, dataset: Dataset, envelope: Value) -> Self {
        self.responses.insert(dataset.key(), envelope);
        self
    }

    pub fn failing_zone_queries(mut self, zone_id: &str) -> Self {
        self.failing_zones.insert(zone_id.to_string());
        self
    }

    pub fn with_quota(mut self, max: f64, current: f64, available: f64) -> Self {
        self.quota = Some(ZoneQuota {
            max,
            current,
            available,
        });
        self
    }

    pub fn query_count(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn quota_count(&self) -> usize {
        self.quota_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsApi for MockApi {
    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        Ok(vec![self.account.clone()])
    }

    async fn verify_token(&self, _account_id: &str) -> Result<(), ClientError> {
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.zones.clone())
    }

    async fn zone_name(&self, zone_id: &str) -> Result<String, ClientError> {
        self.names
            .get(zone_id)
            .cloned()
            .ok_or_else(|| ClientError::Api(format!("unknown zone {zone_id}")))
    }

    async fn zone_plan(&self, zone_id: &str) -> Result<String, ClientError> {
        self.plans
            .get(zone_id)
            .cloned()
            .ok_or_else(|| ClientError::Api(format!("unknown zone {zone_id}")))
    }

    async fn query_analytics(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(zone) = variables["zoneTag"].as_str() {
            if self.failing_zones.contains(zone) {
                return Err(ClientError::Api("simulated upstream failure".to_string()));
            }
        }

        for (key, envelope) in &self.responses {
            if query.contains(key) {
                return Ok(envelope.clone());
            }
        }
        // No canned data: an envelope that decodes to zero rows.
        Ok(json!({ "data": { "viewer": { "zones": [ {} ] } } }))
    }

    async fn account_quota(&self, _account_id: &str) -> Result<ZoneQuota, ClientError> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        self.quota
            .ok_or_else(|| ClientError::Api("quota unavailable".to_string()))
    }
}
