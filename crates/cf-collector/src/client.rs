//! Upstream Cloudflare API client.
//!
//! `AnalyticsApi` is the seam the fetch cycle depends on; tests swap in
//! mock implementations. `CloudflareClient` is the real thing: GraphQL
//! analytics queries plus the handful of v4 REST calls the exporter
//! needs (accounts, zones, subscriptions, token verification).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ClientError;

/// Fixed per-request timeout for upstream calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A Cloudflare account as returned by the v4 API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
}

/// Enterprise zone quota from the account's legacy flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneQuota {
    pub max: f64,
    pub current: f64,
    pub available: f64,
}

/// What the collector requires from the upstream API.
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// Accounts the API token can see.
    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError>;

    /// Verify the token is valid for the given account.
    async fn verify_token(&self, account_id: &str) -> Result<(), ClientError>;

    /// Ids of all zones the token can see.
    async fn list_zones(&self) -> Result<Vec<String>, ClientError>;

    /// Display name of a zone.
    async fn zone_name(&self, zone_id: &str) -> Result<String, ClientError>;

    /// Rate plan id of a zone's subscription (e.g. `cf_free`).
    async fn zone_plan(&self, zone_id: &str) -> Result<String, ClientError>;

    /// Run one GraphQL analytics query. Single attempt; the fetch
    /// cycle owns the retry policy.
    async fn query_analytics(&self, query: &str, variables: Value) -> Result<Value, ClientError>;

    /// Latest enterprise zone quota for an account.
    async fn account_quota(&self, account_id: &str) -> Result<ZoneQuota, ClientError>;
}

/// reqwest-backed client against the Cloudflare v4 API.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    graphql_url: String,
    rest_base: String,
}

impl CloudflareClient {
    /// Build a client for the given GraphQL endpoint and bearer token.
    ///
    /// REST calls reuse the endpoint's base with the trailing
    /// `/graphql` stripped, so a mock server can stand in for both
    /// surfaces at one address.
    pub fn new(api_url: &str, api_token: &str) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_token}"))
            .map_err(|_| ClientError::Api("API token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let rest_base = api_url
            .strip_suffix("/graphql")
            .unwrap_or(api_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            graphql_url: api_url.to_string(),
            rest_base,
        })
    }

    /// GET a v4 REST path and unwrap the `result` field of the
    /// standard `{ success, result, errors }` envelope.
    async fn rest_get(&self, path: &str) -> Result<Value, ClientError> {
        let url = format!("{}{path}", self.rest_base);
        debug!(%url, "rest request");
        let mut body: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body["success"].as_bool() != Some(true) {
            return Err(ClientError::Api(body["errors"].to_string()));
        }
        Ok(body["result"].take())
    }
}

#[async_trait]
impl AnalyticsApi for CloudflareClient {
    async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        let result = self.rest_get("/accounts").await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::UnexpectedResponse(format!("accounts list: {e}")))
    }

    async fn verify_token(&self, account_id: &str) -> Result<(), ClientError> {
        self.rest_get(&format!("/accounts/{account_id}/tokens/verify"))
            .await?;
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<String>, ClientError> {
        let result = self.rest_get("/zones").await?;
        let zones = result
            .as_array()
            .ok_or_else(|| ClientError::UnexpectedResponse("zones list is not an array".into()))?;
        zones
            .iter()
            .map(|z| {
                z["id"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ClientError::UnexpectedResponse("zone without id".into()))
            })
            .collect()
    }

    async fn zone_name(&self, zone_id: &str) -> Result<String, ClientError> {
        let result = self.rest_get(&format!("/zones/{zone_id}")).await?;
        result["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::UnexpectedResponse("zone without name".into()))
    }

    async fn zone_plan(&self, zone_id: &str) -> Result<String, ClientError> {
        let result = self
            .rest_get(&format!("/zones/{zone_id}/subscription"))
            .await?;
        result["rate_plan"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::UnexpectedResponse("subscription without rate plan".into()))
    }

    async fn query_analytics(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        let payload = json!({ "query": query, "variables": variables });
        let response: Value = self
            .http
            .post(&self.graphql_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    async fn account_quota(&self, account_id: &str) -> Result<ZoneQuota, ClientError> {
        let result = self.rest_get(&format!("/accounts/{account_id}")).await?;
        let quota = &result["legacy_flags"]["enterprise_zone_quota"];
        let field = |name: &str| {
            quota[name].as_f64().ok_or_else(|| {
                ClientError::UnexpectedResponse(format!("enterprise zone quota missing {name}"))
            })
        };
        Ok(ZoneQuota {
            max: field("maximum")?,
            current: field("current")?,
            available: field("available")?,
        })
    }
}
