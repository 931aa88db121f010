//! Catalog of Cloudflare GraphQL analytics datasets.
//!
//! Each dataset carries its GraphQL key, query text, and scope (zone
//! or account variables). The active list depends on the configured
//! metadata-boundary region minus any configured exclusions.

use serde_json::{Value, json};

use crate::config::CmbRegion;
use crate::fetch::QueryWindow;

/// Rate plan id Cloudflare reports for zones on the free tier.
pub const FREE_PLAN_ID: &str = "cf_free";

/// Whether a dataset's query variables are zone- or account-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetScope {
    Zone,
    Account,
}

/// A named upstream analytics query type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    DnsAnalytics,
    FirewallEvents,
    HttpRequestsOverview,
}

impl Dataset {
    /// GraphQL field name, also the configuration-facing identifier.
    pub fn key(&self) -> &'static str {
        match self {
            Dataset::DnsAnalytics => "dnsAnalyticsAdaptiveGroups",
            Dataset::FirewallEvents => "firewallEventsAdaptiveGroups",
            Dataset::HttpRequestsOverview => "httpRequestsOverviewAdaptiveGroups",
        }
    }

    pub fn scope(&self) -> DatasetScope {
        match self {
            Dataset::DnsAnalytics => DatasetScope::Account,
            Dataset::FirewallEvents | Dataset::HttpRequestsOverview => DatasetScope::Zone,
        }
    }

    /// Datasets queryable for zones on the free plan.
    pub fn free_tier_allowed(&self) -> bool {
        matches!(self, Dataset::HttpRequestsOverview)
    }

    pub fn query(&self) -> &'static str {
        match self {
            Dataset::DnsAnalytics => DNS_ANALYTICS_QUERY,
            Dataset::FirewallEvents => FIREWALL_EVENTS_QUERY,
            Dataset::HttpRequestsOverview => HTTP_REQUESTS_OVERVIEW_QUERY,
        }
    }

    /// Query variables for one zone × dataset pair.
    pub fn variables(&self, zone_id: &str, account_id: &str, window: &QueryWindow) -> Value {
        match self.scope() {
            DatasetScope::Zone => json!({
                "zoneTag": zone_id,
                "datetimeGeq": window.start_str(),
                "datetimeLeq": window.end_str(),
            }),
            DatasetScope::Account => json!({
                "accountId": account_id,
                "datetimeGeq": window.start_str(),
                "datetimeLeq": window.end_str(),
            }),
        }
    }
}

/// Datasets for a region preset, minus configured exclusions, in the
/// fixed order fetch cycles walk them.
pub fn active_datasets(region: CmbRegion, exclude: &[String]) -> Vec<Dataset> {
    let preset: &[Dataset] = match region {
        // The EU metadata boundary does not serve DNS analytics.
        CmbRegion::Eu => &[Dataset::HttpRequestsOverview, Dataset::FirewallEvents],
        CmbRegion::Global | CmbRegion::Us => &[
            Dataset::DnsAnalytics,
            Dataset::FirewallEvents,
            Dataset::HttpRequestsOverview,
        ],
    };
    preset
        .iter()
        .copied()
        .filter(|d| !exclude.iter().any(|e| e == d.key()))
        .collect()
}

const HTTP_REQUESTS_OVERVIEW_QUERY: &str = r#"
query HttpRequestsOverview($zoneTag: string, $datetimeGeq: Time, $datetimeLeq: Time) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      httpRequestsOverviewAdaptiveGroups(
        limit: 10000
        filter: { datetime_geq: $datetimeGeq, datetime_leq: $datetimeLeq }
      ) {
        dimensions {
          clientCountryName
          edgeResponseStatus
        }
        sum {
          requests
          bytes
          cachedRequests
          cachedBytes
        }
      }
    }
  }
}
"#;

const FIREWALL_EVENTS_QUERY: &str = r#"
query FirewallEvents($zoneTag: string, $datetimeGeq: Time, $datetimeLeq: Time) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      firewallEventsAdaptiveGroups(
        limit: 10000
        filter: { datetime_geq: $datetimeGeq, datetime_leq: $datetimeLeq }
      ) {
        dimensions {
          action
          ruleId
          source
        }
        count
      }
    }
  }
}
"#;

const DNS_ANALYTICS_QUERY: &str = r#"
query DnsAnalytics($accountId: string, $datetimeGeq: Time, $datetimeLeq: Time) {
  viewer {
    accounts(filter: { accountTag: $accountId }) {
      dnsAnalyticsAdaptiveGroups(
        limit: 10000
        filter: { datetime_geq: $datetimeGeq, datetime_leq: $datetimeLeq }
      ) {
        dimensions {
          queryName
          responseCode
        }
        count
      }
    }
  }
}
"#;
