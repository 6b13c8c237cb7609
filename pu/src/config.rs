//! Configuration types and loading

use eyre::{Context, Result, eyre};
use pagecache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::TaskKind;
use crate::feed::DEFAULT_MAX_RATE_LIMIT_ATTEMPTS;
use crate::scheduler::SchedulerConfig;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker caps per group
    pub scheduler: SchedulerConfig,

    /// Response cache shared by the simulated feeds
    pub cache: CacheConfig,

    /// Feeds and the securities they refresh
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            cache: CacheConfig::default(),
            feeds: default_feeds(),
        }
    }
}

impl Config {
    /// Reject configurations that cannot produce a sensible plan
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for feed in &self.feeds {
            if feed.id.trim().is_empty() {
                return Err(eyre!("Feed with empty id"));
            }
            if !ids.insert(feed.id.as_str()) {
                return Err(eyre!("Duplicate feed id: {}", feed.id));
            }
            if let Some(security) = feed.securities.iter().find(|s| s.id.trim().is_empty()) {
                return Err(eyre!("Feed {} has a security with empty id (name: {})", feed.id, security.name));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local: .priceupdate.yml
        let local_config = PathBuf::from(".priceupdate.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User: ~/.config/priceupdate/priceupdate.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("priceupdate").join("priceupdate.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// A simulated feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed identifier, also the default grouping criterion
    pub id: String,

    /// Base latency of one fetch
    #[serde(rename = "latency-ms")]
    pub latency_ms: u64,

    /// Random extra latency, up to this many milliseconds
    #[serde(rename = "jitter-ms")]
    pub jitter_ms: u64,

    /// Answer every Nth call with a rate limit, 0 disables
    #[serde(rename = "rate-limit-every")]
    pub rate_limit_every: u64,

    /// Delay suggested with a rate limit
    #[serde(rename = "retry-after-ms")]
    pub retry_after_ms: u64,

    #[serde(rename = "max-rate-limit-attempts")]
    pub max_rate_limit_attempts: i32,

    /// Fail every call as if the credentials had expired
    #[serde(rename = "auth-expired")]
    pub auth_expired: bool,

    /// Security ids the feed does not know
    pub misconfigured: Vec<String>,

    pub securities: Vec<SecurityConfig>,

    /// Data refreshed for every security
    pub kinds: Vec<TaskKind>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            latency_ms: 50,
            jitter_ms: 25,
            rate_limit_every: 0,
            retry_after_ms: 1000,
            max_rate_limit_attempts: DEFAULT_MAX_RATE_LIMIT_ATTEMPTS,
            auth_expired: false,
            misconfigured: Vec::new(),
            securities: Vec::new(),
            kinds: vec![TaskKind::Prices],
        }
    }
}

/// Security master data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub id: String,

    /// Display name, defaults to the id
    #[serde(default)]
    pub name: String,
}

impl SecurityConfig {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig {
            id: "yahoo".to_string(),
            rate_limit_every: 7,
            retry_after_ms: 200,
            securities: vec![
                SecurityConfig::new("SAP.DE", "SAP SE"),
                SecurityConfig::new("ALV.DE", "Allianz SE"),
                SecurityConfig::new("SIE.DE", "Siemens AG"),
                SecurityConfig::new("BAS.DE", "BASF SE"),
                SecurityConfig::new("AAPL", "Apple Inc."),
                SecurityConfig::new("MSFT", "Microsoft Corp."),
            ],
            kinds: vec![TaskKind::Prices, TaskKind::Dividends],
            ..Default::default()
        },
        FeedConfig {
            id: "ecb".to_string(),
            latency_ms: 20,
            securities: vec![
                SecurityConfig::new("EURUSD", "Euro / US Dollar"),
                SecurityConfig::new("EURCHF", "Euro / Swiss Franc"),
            ],
            ..Default::default()
        },
        FeedConfig {
            id: "coingecko".to_string(),
            latency_ms: 120,
            max_rate_limit_attempts: 10,
            securities: vec![SecurityConfig::new("bitcoin", "Bitcoin")],
            ..Default::default()
        },
    ]
}
