//! Centralized configuration (environment variables + defaults).

use crate::domain::policy::{ScrapePolicy, DEFAULT_IDENTITY_PREFIX_CHARS, DEFAULT_MIN_INTERVAL};
use anyhow::{anyhow, Context};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SCRAPER_URL_TEMPLATE: &str = "http://127.0.0.1:8081/reviews/{app}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub policy: ScrapePolicy,
    pub upstream_timeout: Duration,
    pub scraper_url_template: String,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Loads `.env` (if present) and reads every setting from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let storage_backend = storage_backend()?;
        let database_url = database_url();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when STORAGE_BACKEND=postgres"));
        }

        Ok(Self {
            bind_addr: bind_addr()?,
            storage_backend,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5u32)?.max(1),
            policy: scrape_policy()?,
            upstream_timeout: Duration::from_secs(
                parse_or("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT.as_secs())?.max(1),
            ),
            scraper_url_template: scraper_url_template(),
            log_format: log_format(),
        })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

/// Listen address for the API server.
pub fn bind_addr() -> anyhow::Result<SocketAddr> {
    let raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    raw.parse()
        .with_context(|| format!("BIND_ADDR is not a socket address: {}", raw))
}

pub fn storage_backend() -> anyhow::Result<StorageBackend> {
    match var("STORAGE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
        None | Some("memory") => Ok(StorageBackend::Memory),
        Some("postgres") => Ok(StorageBackend::Postgres),
        Some(other) => Err(anyhow!("STORAGE_BACKEND must be 'memory' or 'postgres', got '{}'", other)),
    }
}

/// Database URL; only required by the postgres backend.
pub fn database_url() -> Option<String> {
    var("DATABASE_URL")
}

pub fn scraper_url_template() -> String {
    var("SCRAPER_URL_TEMPLATE").unwrap_or_else(|| DEFAULT_SCRAPER_URL_TEMPLATE.to_string())
}

pub fn log_format() -> LogFormat {
    match var("LOG_FORMAT").as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Cooldowns and identity prefix length.
///
/// `SCRAPE_APP_INTERVALS` takes `app=secs` pairs separated by commas.
pub fn scrape_policy() -> anyhow::Result<ScrapePolicy> {
    let default_secs = parse_or("SCRAPE_MIN_INTERVAL_SECS", DEFAULT_MIN_INTERVAL.as_secs())?;
    let prefix_chars = parse_or("IDENTITY_PREFIX_CHARS", DEFAULT_IDENTITY_PREFIX_CHARS)?;
    let mut policy = ScrapePolicy::new(Duration::from_secs(default_secs))
        .with_identity_prefix_chars(prefix_chars);
    if let Some(raw) = var("SCRAPE_APP_INTERVALS") {
        for (app, interval) in parse_app_intervals(&raw)? {
            policy = policy.with_app_interval(&app, interval);
        }
    }
    Ok(policy)
}

pub fn parse_app_intervals(raw: &str) -> anyhow::Result<Vec<(String, Duration)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (app, secs) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("SCRAPE_APP_INTERVALS entry '{}' is not app=secs", pair))?;
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("SCRAPE_APP_INTERVALS entry '{}' has a bad interval", pair))?;
            Ok((app.trim().to_string(), Duration::from_secs(secs)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_interval_overrides() {
        let parsed = parse_app_intervals(" shopify=600, woocommerce = 1200 ,").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("shopify".to_string(), Duration::from_secs(600)),
                ("woocommerce".to_string(), Duration::from_secs(1200)),
            ]
        );
    }

    #[test]
    fn rejects_malformed_app_intervals() {
        assert!(parse_app_intervals("shopify").is_err());
        assert!(parse_app_intervals("shopify=soon").is_err());
    }
}
