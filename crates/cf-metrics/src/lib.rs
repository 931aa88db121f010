//! cf-metrics — Prometheus exposition for the Cloudflare exporter.
//!
//! A pure render step: `SampleStore::snapshot()` in, exposition text
//! out. All state lives in cf-store; this crate never blocks and never
//! mutates anything.

pub mod prometheus;

pub use prometheus::render_prometheus;
