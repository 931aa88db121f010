//! cf-exporter — Prometheus exporter for Cloudflare analytics.
//!
//! Polls the Cloudflare GraphQL analytics API on a fixed interval and
//! republishes the results as pull-based metrics:
//! - Sample store (cf-store)
//! - Fetch cycle + collection scheduler (cf-collector)
//! - Text exposition (cf-metrics) served over axum
//!
//! Configured entirely through `CF_*` environment variables; see
//! `ExporterConfig`.

mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use cf_collector::datasets::active_datasets;
use cf_collector::{CloudflareClient, ExporterConfig, FetchCycle, Scheduler, setup};
use cf_store::SampleStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A local .env file may supply CF_* variables; absence is fine.
    dotenvy::dotenv().ok();

    // Configuration errors are fatal before anything else starts.
    let config = ExporterConfig::from_env()?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter())),
        )
        .init();

    info!("starting Cloudflare exporter");

    // ── Upstream discovery ─────────────────────────────────────

    let client = Arc::new(CloudflareClient::new(&config.api_url, &config.api_token)?);
    let account = setup::resolve_account(client.as_ref()).await?;
    info!(account = %account.name, "connected to Cloudflare account");

    let zones = setup::define_zones(client.as_ref(), &config).await?;
    let datasets = active_datasets(config.region, &config.exclude_datasets);
    info!(
        zones = zones.len(),
        datasets = datasets.len(),
        "collection plan resolved"
    );

    // ── Shared store + background collection ───────────────────

    let store = SampleStore::new();
    store.set_identity(&account.name, &account.id);

    let cycle = FetchCycle::new(
        client,
        store.clone(),
        account,
        zones,
        datasets,
        config.scrape_delay,
    );
    let scheduler = Scheduler::new(cycle, config.scrape_delay, config.max_workers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    // ── Exposition server ──────────────────────────────────────

    let router = server::build_router(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    info!(%addr, "metrics server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = scheduler_handle.await;
    info!("Cloudflare exporter stopped");
    Ok(())
}
