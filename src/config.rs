use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Next pipeline stage for allowed queries, e.g. `udp://8.8.8.8:53`.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// Blocklist sources in merge order.
    #[serde(default = "default_blocklists")]
    pub blocklists: Vec<String>,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub response: ResponseConfig,

    #[serde(default)]
    pub updates: UpdateConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RulesConfig {
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub regex_blacklist: Vec<String>,
    #[serde(default)]
    pub regex_whitelist: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResponseConfig {
    #[serde(default)]
    pub nxdomain: bool,
    #[serde(default = "default_target_ipv4")]
    pub target_ipv4: Ipv4Addr,
    #[serde(default = "default_target_ipv6")]
    pub target_ipv6: Ipv6Addr,
    #[serde(default = "default_sinkhole_ttl")]
    pub sinkhole_ttl: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateConfig {
    #[serde(default = "default_update_enable")]
    pub enable: bool,
    #[serde(default = "default_update_interval")]
    pub interval_hours: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_blocked")]
    pub log_blocked: bool,
    #[serde(default)]
    pub log_all_queries: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_enable")]
    pub enable: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5300
}
fn default_upstream() -> String {
    "udp://8.8.8.8:53".to_string()
}
fn default_upstream_timeout_ms() -> u64 {
    2000
}
fn default_target_ipv4() -> Ipv4Addr {
    Ipv4Addr::new(10, 1, 33, 7)
}
fn default_target_ipv6() -> Ipv6Addr {
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0x9cbd, 0xc3ff, 0xfe28, 0xe133)
}
fn default_sinkhole_ttl() -> u32 {
    3600
}
fn default_update_enable() -> bool {
    true
}
fn default_update_interval() -> u64 {
    24
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_concurrent_downloads() -> usize {
    4
}
fn default_store_kind() -> String {
    "file".to_string()
}
fn default_store_path() -> String {
    "blocklist.json.gz".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_blocked() -> bool {
    true
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}
fn default_api_enable() -> bool {
    true
}
fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_blocklists() -> Vec<String> {
    vec![
        "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts".to_string(),
        "https://s3.amazonaws.com/lists.disconnect.me/simple_tracking.txt".to_string(),
        "https://s3.amazonaws.com/lists.disconnect.me/simple_ad.txt".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: default_upstream(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            blocklists: default_blocklists(),
            rules: RulesConfig::default(),
            response: ResponseConfig::default(),
            updates: UpdateConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            nxdomain: false,
            target_ipv4: default_target_ipv4(),
            target_ipv6: default_target_ipv6(),
            sinkhole_ttl: default_sinkhole_ttl(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enable: default_update_enable(),
            interval_hours: default_update_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            concurrent_downloads: default_concurrent_downloads(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: default_store_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_blocked: default_log_blocked(),
            log_all_queries: false,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable: default_api_enable(),
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl UpdateConfig {
    /// Refresh period and maximum snapshot age. Never shorter than a minute.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600).max(60))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config TOML")
    }
}
