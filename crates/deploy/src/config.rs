//! `GeoPack.toml` sections and their defaults.

use std::path::Path;
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    Economics, RetryPolicy,
    economics::{DEFAULT_BASE_URI_TEMPLATE, SLUG_PLACEHOLDER},
};

/// The default name for the geopack configuration file.
pub const CONFIG_FILENAME: &str = "GeoPack.toml";

/// Default marketplace API root.
pub const DEFAULT_MARKETPLACE_URL: &str = "https://build.wield.xyz/vibe";

/// Base mainnet.
pub const BASE_CHAIN_ID: u64 = 8453;

pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

/// Complete geopack configuration.
///
/// Every section has defaults except the factory address and API key, which
/// [`Config::validate`] insists on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub marketplace: MarketplaceConfig,
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    pub economics: Economics,
    pub deployment: DeploymentConfig,
}

/// Marketplace REST API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: String,
    /// Sent as the `API-KEY` header.
    pub api_key: String,
    pub request_timeout_secs: u64,
    /// Lifetime of cached lookups (ETH price, collection lists).
    pub cache_ttl_secs: u64,
    /// Lifetime of an in-memory bearer token.
    pub token_ttl_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKETPLACE_URL.to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
            cache_ttl_secs: 300,
            token_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of a wallet-connected provider.
    pub rpc_url: String,
    pub chain_id: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: BASE_CHAIN_ID,
        }
    }
}

/// Deployed contract addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Factory or proxy exposing `createDropWithConfig`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// When set, deployments go through `deployWithFee` on this wrapper.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_wrapper: Option<Address>,
    /// Referrer credited on mints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<Address>,
}

/// Knobs of the deployment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Must contain `{slug}`.
    pub base_uri_template: String,
    pub tx_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub readiness_interval_secs: u64,
    pub readiness_max_attempts: usize,
    pub upload_batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            base_uri_template: DEFAULT_BASE_URI_TEMPLATE.to_string(),
            tx_timeout_secs: 60,
            receipt_poll_interval_ms: 1_000,
            readiness_interval_secs: 10,
            readiness_max_attempts: 30,
            upload_batch_size: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl DeploymentConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs)
    }
}

impl Config {
    /// Check required settings, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.contracts.factory.is_none_or(|a| a == Address::ZERO) {
            problems.push("contracts.factory is required".to_string());
        }
        if self.marketplace.api_key.trim().is_empty() {
            problems.push("marketplace.api_key is required".to_string());
        }
        if let Err(e) = Url::parse(&self.marketplace.base_url) {
            problems.push(format!("marketplace.base_url is not a URL: {}", e));
        }
        if let Err(e) = Url::parse(&self.chain.rpc_url) {
            problems.push(format!("chain.rpc_url is not a URL: {}", e));
        }
        if self.chain.chain_id == 0 {
            problems.push("chain.chain_id must be non-zero".to_string());
        }
        if !self.deployment.base_uri_template.contains(SLUG_PLACEHOLDER) {
            problems.push(format!(
                "deployment.base_uri_template must contain {}",
                SLUG_PLACEHOLDER
            ));
        }
        if self.deployment.upload_batch_size == 0 {
            problems.push("deployment.upload_batch_size must be at least 1".to_string());
        }
        if self.deployment.readiness_max_attempts == 0 {
            problems.push("deployment.readiness_max_attempts must be at least 1".to_string());
        }
        if self.deployment.tx_timeout_secs == 0 {
            problems.push("deployment.tx_timeout_secs must be non-zero".to_string());
        }

        if !problems.is_empty() {
            anyhow::bail!("Invalid configuration: {}", problems.join("; "));
        }
        Ok(())
    }

    /// The factory address, which `validate` guarantees is present.
    pub fn factory(&self) -> Result<Address> {
        self.contracts
            .factory
            .context("No factory address configured (contracts.factory)")
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `GeoPack.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::debug!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}
