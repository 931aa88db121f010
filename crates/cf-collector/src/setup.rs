//! Startup-time discovery: account resolution, credential
//! verification, and the zone list to monitor.

use anyhow::{Context, bail};
use tracing::{debug, info};

use crate::client::{Account, AnalyticsApi};
use crate::config::ExporterConfig;

/// Resolve the first account the token can see and verify the token
/// against it.
pub async fn resolve_account<C: AnalyticsApi>(client: &C) -> anyhow::Result<Account> {
    let accounts = client
        .list_accounts()
        .await
        .context("could not list Cloudflare accounts")?;
    let Some(account) = accounts.into_iter().next() else {
        bail!("no Cloudflare accounts found");
    };
    debug!(account = %account.name, "retrieved Cloudflare account");

    client
        .verify_token(&account.id)
        .await
        .context("could not verify Cloudflare token")?;
    debug!("verified Cloudflare credentials");

    Ok(account)
}

/// The zone ids to monitor: the configured allow-list if present,
/// otherwise every visible zone, minus explicit exclusions.
pub async fn define_zones<C: AnalyticsApi>(
    client: &C,
    config: &ExporterConfig,
) -> anyhow::Result<Vec<String>> {
    let mut zones = match &config.zones {
        Some(allowed) => allowed.clone(),
        None => client.list_zones().await.context("could not list zones")?,
    };

    if !config.exclude_zones.is_empty() {
        zones.retain(|z| !config.exclude_zones.contains(z));
    }

    if zones.is_empty() {
        bail!("no zones found to monitor");
    }
    info!(zones = zones.len(), "zones to monitor");
    Ok(zones)
}
