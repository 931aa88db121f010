//! Exporter configuration from `CF_`-prefixed environment variables.
//!
//! Every violation is fatal at startup; the process never enters the
//! collection loop with a half-valid configuration.

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4/graphql";

/// Cloudflare Metadata Boundary region. Gates which analytics datasets
/// are queryable for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmbRegion {
    #[default]
    Global,
    Eu,
    Us,
}

impl CmbRegion {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "global" => Ok(CmbRegion::Global),
            "eu" => Ok(CmbRegion::Eu),
            "us" => Ok(CmbRegion::Us),
            _ => Err(ConfigError::Invalid {
                key: "CF_CMB_REGION",
                value: value.to_string(),
            }),
        }
    }
}

/// Log verbosity, mapped onto a tracing env-filter directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            // Python logging spellings still accepted.
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Invalid {
                key: "CF_LOG_LEVEL",
                value: value.to_string(),
            }),
        }
    }

    /// Directive string for `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Immutable exporter configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Port the Prometheus exposition endpoint listens on (1024-65535).
    pub listen_port: u16,
    pub log_level: LogLevel,
    /// Size of the fetch-cycle worker pool (3-10).
    pub max_workers: usize,
    pub api_token: String,
    /// GraphQL endpoint; REST calls use the same base with `/graphql`
    /// stripped.
    pub api_url: String,
    pub region: CmbRegion,
    /// Dataset keys excluded from collection.
    pub exclude_datasets: Vec<String>,
    /// Zone ids excluded from collection.
    pub exclude_zones: Vec<String>,
    /// Explicit zone allow-list; `None` means discover all zones.
    pub zones: Option<Vec<String>>,
    /// Collection interval; also sizes the query window and (doubled)
    /// the entry retention window.
    pub scrape_delay: Duration,
}

impl ExporterConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an injected variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_token = lookup("CF_API_TOKEN").unwrap_or_default();
        if api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let listen_port = parse_int(&lookup, "CF_LISTEN_PORT", 8080)?;
        check_range("CF_LISTEN_PORT", listen_port, 1024, 65535, "1024-65535")?;

        let max_workers = parse_int(&lookup, "CF_MAX_WORKERS", 5)?;
        check_range("CF_MAX_WORKERS", max_workers, 3, 10, "3-10")?;

        let scrape_delay = parse_int(&lookup, "CF_SCRAPE_DELAY", 60)?;
        check_range("CF_SCRAPE_DELAY", scrape_delay, 60, 300, "60-300")?;
        if scrape_delay % 60 != 0 {
            return Err(ConfigError::OutOfRange {
                key: "CF_SCRAPE_DELAY",
                value: scrape_delay,
                expected: "a multiple of 60",
            });
        }

        let log_level = match lookup("CF_LOG_LEVEL") {
            Some(value) => LogLevel::parse(&value)?,
            None => LogLevel::default(),
        };
        let region = match lookup("CF_CMB_REGION") {
            Some(value) => CmbRegion::parse(&value)?,
            None => CmbRegion::default(),
        };

        Ok(Self {
            listen_port: listen_port as u16,
            log_level,
            max_workers: max_workers as usize,
            api_token,
            api_url: lookup("CF_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            region,
            exclude_datasets: parse_list(lookup("CF_EXCLUDE_DATASETS")),
            exclude_zones: parse_list(lookup("CF_EXCLUDE_ZONES")),
            zones: lookup("CF_ZONES").map(|v| parse_list(Some(v))),
            scrape_delay: Duration::from_secs(scrape_delay as u64),
        })
    }
}

fn parse_int(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

fn check_range(
    key: &'static str,
    value: i64,
    min: i64,
    max: i64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            key,
            value,
            expected,
        });
    }
    Ok(())
}

fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
