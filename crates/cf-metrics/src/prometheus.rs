//! Prometheus text exposition format.
//!
//! Renders a store snapshot into the text format scraped by a
//! Prometheus server. Every family is a gauge of the latest observed
//! sums; HTTP and firewall samples carry their query-window start as a
//! millisecond exposition timestamp so gaps between fetch cycles stay
//! visible to the scraper.

use std::fmt::Write;

use cf_store::{HttpRequestEntry, StoreSnapshot};

/// Render a store snapshot into Prometheus text format.
///
/// Given the same snapshot the output is identical; within a family,
/// sample order follows snapshot input order. The quota families are
/// emitted only once a quota reading has been captured; before that
/// there is no "last known value" to publish.
pub fn render_prometheus(snapshot: &StoreSnapshot) -> String {
    let mut out = String::new();

    let (account, account_id) = match &snapshot.identity {
        Some(identity) => (identity.name.as_str(), identity.id.as_str()),
        None => ("", ""),
    };

    // HTTP request metrics: four parallel families over one label tuple.
    http_family(&mut out, &snapshot.http, account, account_id,
        "cloudflare_requests_total", "Total number of HTTP requests",
        |e| e.requests);
    http_family(&mut out, &snapshot.http, account, account_id,
        "cloudflare_bytes_total", "Total bytes transferred",
        |e| e.bytes);
    http_family(&mut out, &snapshot.http, account, account_id,
        "cloudflare_cached_requests_total", "Total number of cached HTTP requests",
        |e| e.cached_requests);
    http_family(&mut out, &snapshot.http, account, account_id,
        "cloudflare_cached_bytes_total", "Total cached bytes transferred",
        |e| e.cached_bytes);

    // Firewall events.
    header(&mut out, "cloudflare_firewall_events_total", "Total number of firewall events");
    for e in &snapshot.firewall {
        sample(
            &mut out,
            "cloudflare_firewall_events_total",
            &[
                ("zone", &e.zone),
                ("action", &e.action),
                ("rule_id", &e.rule_id),
                ("source", &e.source),
                ("account", account),
                ("account_id", account_id),
            ],
            &e.count.to_string(),
            Some(e.captured_at),
        );
    }

    // Cumulative transport failures; no timestamp, the counter is live.
    header(&mut out, "cloudflare_scrape_errors_total", "Total number of scrape errors");
    sample(
        &mut out,
        "cloudflare_scrape_errors_total",
        &[("account", account), ("account_id", account_id)],
        &snapshot.scrape_errors.to_string(),
        None,
    );

    // Enterprise zone quota, only once a reading has been captured.
    if let Some(quota) = snapshot.quota {
        quota_family(&mut out, "cloudflare_enterprise_zone_quota_max",
            "Maximum enterprise zone quota", account, account_id, quota.max, quota.captured_at);
        quota_family(&mut out, "cloudflare_enterprise_zone_quota_current",
            "Current enterprise zone quota usage", account, account_id, quota.current, quota.captured_at);
        quota_family(&mut out, "cloudflare_enterprise_zone_quota_available",
            "Available enterprise zone quota", account, account_id, quota.available, quota.captured_at);
    }

    out
}

fn http_family(
    out: &mut String,
    entries: &[HttpRequestEntry],
    account: &str,
    account_id: &str,
    name: &str,
    help: &str,
    value: impl Fn(&HttpRequestEntry) -> u64,
) {
    header(out, name, help);
    for e in entries {
        let status = e.status.to_string();
        sample(
            out,
            name,
            &[
                ("zone", &e.zone),
                ("country", &e.country),
                ("status", &status),
                ("account", account),
                ("account_id", account_id),
            ],
            &value(e).to_string(),
            Some(e.captured_at),
        );
    }
}

fn quota_family(
    out: &mut String,
    name: &str,
    help: &str,
    account: &str,
    account_id: &str,
    value: f64,
    captured_at: i64,
) {
    header(out, name, help);
    sample(
        out,
        name,
        &[("account", account), ("account_id", account_id)],
        &format!("{value}"),
        Some(captured_at),
    );
}

fn header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn sample(
    out: &mut String,
    name: &str,
    labels: &[(&str, &str)],
    value: &str,
    timestamp_secs: Option<i64>,
) {
    out.push_str(name);
    out.push('{');
    for (i, (key, val)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{key}=\"{}\"", escape_label_value(val));
    }
    out.push_str("} ");
    out.push_str(value);
    if let Some(secs) = timestamp_secs {
        // Exposition timestamps are milliseconds since epoch.
        let _ = write!(out, " {}", secs * 1000);
    }
    out.push('\n');
}

/// Escape a label value per the exposition format: backslash, double
/// quote, and line feed.
fn escape_label_value(value: &str) -> String {
    if !value.contains(['\\', '"', '\n']) {
        return value.to_string();
    }
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_store::{AccountIdentity, FirewallEventEntry, QuotaSnapshot};

    fn http_entry() -> HttpRequestEntry {
        HttpRequestEntry {
            zone: "example.com".to_string(),
            captured_at: 1_709_900_040,
            country: "US".to_string(),
            status: 200,
            requests: 100,
            bytes: 1_024_000,
            cached_requests: 75,
            cached_bytes: 768_000,
        }
    }

    fn identity() -> AccountIdentity {
        AccountIdentity {
            name: "acct".to_string(),
            id: "id1".to_string(),
        }
    }

    fn family_count(output: &str) -> usize {
        output.matches("# TYPE ").count()
    }

    #[test]
    fn render_empty_snapshot_keeps_base_headers() {
        let output = render_prometheus(&StoreSnapshot::default());
        assert!(output.contains("# HELP cloudflare_requests_total"));
        assert!(output.contains("# TYPE cloudflare_requests_total gauge"));
        // No quota reading yet: the three quota families are withheld.
        assert_eq!(family_count(&output), 6);
        assert!(!output.contains("cloudflare_enterprise_zone_quota_max"));
    }

    #[test]
    fn quota_families_wait_for_first_reading() {
        // Identity is set at startup, well before the first quota
        // fetch succeeds; nothing may be published until then.
        let snapshot = StoreSnapshot {
            identity: Some(identity()),
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);
        assert_eq!(family_count(&output), 6);
        assert!(!output.contains("cloudflare_enterprise_zone_quota"));
    }

    #[test]
    fn render_single_http_entry() {
        let snapshot = StoreSnapshot {
            http: vec![http_entry()],
            identity: Some(identity()),
            quota: Some(QuotaSnapshot {
                max: 10.0,
                current: 4.0,
                available: 6.0,
                captured_at: 1_709_900_040,
            }),
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);

        assert_eq!(family_count(&output), 9);
        assert!(output.contains(
            "cloudflare_requests_total{zone=\"example.com\",country=\"US\",status=\"200\",account=\"acct\",account_id=\"id1\"} 100"
        ));
        assert!(output.contains(
            "cloudflare_bytes_total{zone=\"example.com\",country=\"US\",status=\"200\",account=\"acct\",account_id=\"id1\"} 1024000"
        ));
        assert!(output.contains(
            "cloudflare_cached_requests_total{zone=\"example.com\",country=\"US\",status=\"200\",account=\"acct\",account_id=\"id1\"} 75"
        ));
        assert!(output.contains(
            "cloudflare_cached_bytes_total{zone=\"example.com\",country=\"US\",status=\"200\",account=\"acct\",account_id=\"id1\"} 768000"
        ));
    }

    #[test]
    fn render_is_deterministic() {
        let snapshot = StoreSnapshot {
            http: vec![http_entry()],
            identity: Some(identity()),
            ..Default::default()
        };
        assert_eq!(render_prometheus(&snapshot), render_prometheus(&snapshot));
    }

    #[test]
    fn samples_carry_millisecond_timestamps() {
        let snapshot = StoreSnapshot {
            http: vec![http_entry()],
            identity: Some(identity()),
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);
        assert!(output.contains("} 100 1709900040000"));
    }

    #[test]
    fn identity_yields_single_error_family() {
        let snapshot = StoreSnapshot {
            identity: Some(identity()),
            scrape_errors: 2,
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);

        let error_samples: Vec<_> = output
            .lines()
            .filter(|l| l.starts_with("cloudflare_scrape_errors_total{"))
            .collect();
        assert_eq!(
            error_samples,
            vec![r#"cloudflare_scrape_errors_total{account="acct",account_id="id1"} 2"#]
        );
    }

    #[test]
    fn quota_uses_captured_at_timestamp() {
        let snapshot = StoreSnapshot {
            identity: Some(identity()),
            quota: Some(QuotaSnapshot {
                max: 20.0,
                current: 12.0,
                available: 8.0,
                captured_at: 1_700_000_000,
            }),
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);
        assert!(output.contains(
            "cloudflare_enterprise_zone_quota_current{account=\"acct\",account_id=\"id1\"} 12 1700000000000"
        ));
    }

    #[test]
    fn firewall_entry_labels() {
        let snapshot = StoreSnapshot {
            firewall: vec![FirewallEventEntry {
                zone: "example.com".to_string(),
                captured_at: 1_709_900_040,
                action: "block".to_string(),
                rule_id: "abc123".to_string(),
                source: "waf".to_string(),
                count: 42,
            }],
            identity: Some(identity()),
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);
        assert!(output.contains(
            "cloudflare_firewall_events_total{zone=\"example.com\",action=\"block\",rule_id=\"abc123\",source=\"waf\",account=\"acct\",account_id=\"id1\"} 42"
        ));
    }

    #[test]
    fn label_values_are_escaped() {
        let mut entry = http_entry();
        entry.country = "a\"b\\c\nd".to_string();
        let snapshot = StoreSnapshot {
            http: vec![entry],
            ..Default::default()
        };
        let output = render_prometheus(&snapshot);
        assert!(output.contains(r#"country="a\"b\\c\nd""#));
    }
}
