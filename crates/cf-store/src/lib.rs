//! cf-store — in-memory sample store for Cloudflare analytics.
//!
//! Holds timestamped metric entries appended by fetch cycles, ages them
//! out after a retention window, and hands out consistent snapshots to
//! the Prometheus render path.
//!
//! The `SampleStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Mutex<..>>`) and is shared between the collection scheduler and
//! the HTTP exposition handler.

pub mod store;
pub mod types;

pub use store::SampleStore;
pub use types::*;
