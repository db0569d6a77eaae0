use std::env;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::dhcp::ParsePolicy;

pub const DEFAULT_LEASE_PATH: &str = "/var/lib/dhcp/dhcpd.leases";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub lease_path: String,
    pub listen_addr: String,
    pub log_level: String,
    pub parse_policy: ParsePolicy,
    /// Periodic re-read on top of change notifications; zero disables it
    pub resync_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let log_level = get("LOG_LEVEL", DEFAULT_LOG_LEVEL).to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            bail!("invalid LOG_LEVEL config: {}", log_level);
        }

        let parse_policy = get("PARSE_POLICY", "tolerant")
            .parse::<ParsePolicy>()
            .map_err(anyhow::Error::msg)
            .context("invalid PARSE_POLICY config")?;

        let resync_secs: u64 = get("RESYNC_INTERVAL_SECS", "300")
            .parse()
            .context("invalid RESYNC_INTERVAL_SECS config")?;

        Ok(Self {
            lease_path: get("DHCP_DB_FILE_PATH", DEFAULT_LEASE_PATH),
            listen_addr: normalize_listen_addr(&get("BIND", DEFAULT_LISTEN_ADDR)),
            log_level,
            parse_policy,
            resync_interval: Duration::from_secs(resync_secs),
        })
    }
}

/// ":8080" -> "0.0.0.0:8080"
fn normalize_listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}
