//! Error types for the collector.
//!
//! The taxonomy separates upstream-down (transport, retried and
//! counted) from query-rejected (application errors, logged and
//! skipped) so operators can tell the two apart.

use thiserror::Error;

/// Errors from a single upstream API call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or HTTP-level failure. Subject to retry.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The v4 REST API answered with `success: false`.
    #[error("api error: {0}")]
    Api(String),

    /// A response decoded but did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Errors from one zone × dataset pair of a fetch cycle. A pair's
/// failure is logged by the cycle and never aborts the other pairs.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The analytics query failed every retry attempt.
    #[error("failed to fetch Cloudflare data after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ClientError,
    },

    /// Zone metadata lookup (name or plan tier) failed.
    #[error("zone metadata lookup failed: {0}")]
    ZoneMetadata(#[source] ClientError),

    /// A result row did not match the dataset's known shape.
    #[error("failed to decode {dataset} row: {source}")]
    Decode {
        dataset: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal configuration problems, reported before the collection loop
/// starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CF_API_TOKEN must be set and non-empty")]
    MissingToken,

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} out of range: {value} (expected {expected})")]
    OutOfRange {
        key: &'static str,
        value: i64,
        expected: &'static str,
    },
}
