//! cf-collector — pulls Cloudflare analytics into the sample store.
//!
//! # Architecture
//!
//! ```text
//! Scheduler::run()                 ── fixed-cadence loop, bounded pool
//!   └── FetchCycle::run()          ── one pass over datasets × zones
//!         ├── AnalyticsApi         ── upstream client (GraphQL + REST)
//!         ├── normalize rows → MetricEntry
//!         └── SampleStore::append()
//! ```
//!
//! The scheduler never blocks on a running cycle: it polls the previous
//! task's handle with zero wait, logs its outcome if finished, and
//! submits the next cycle regardless. Overlapping cycles are safe
//! because the store is additive and thread-safe.

pub mod client;
pub mod config;
pub mod datasets;
pub mod error;
pub mod fetch;
pub mod scheduler;
pub mod setup;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{Account, AnalyticsApi, CloudflareClient, ZoneQuota};
pub use config::{CmbRegion, ExporterConfig, LogLevel};
pub use datasets::Dataset;
pub use error::{ClientError, ConfigError, FetchError};
pub use fetch::FetchCycle;
pub use scheduler::Scheduler;
