//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tws_types::{Address, EconomicParams, TokenAmount};

use crate::logging::LogFormat;
use crate::NodeError;

/// Deployment and runtime configuration for a TWS node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Token quantities are in whole
/// tokens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Receives the initial supply; owner of both the ledger and the engine.
    #[serde(default = "default_owner")]
    pub owner: Address,

    /// Initial supply minted to `owner`, in whole tokens.
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,

    /// The liquidity pool account.
    #[serde(default = "default_pool")]
    pub uniswap_pool: Address,

    /// Custody address of the staking engine.
    #[serde(default = "default_staking_contract")]
    pub staking_contract: Address,

    /// Moved from `owner` to the pool at deployment, in whole tokens.
    #[serde(default = "default_initial_liquidity")]
    pub initial_liquidity: u64,

    /// Switch the transfer tax on after deployment.
    #[serde(default = "default_true")]
    pub tax_enabled: bool,

    /// Open staking after deployment.
    #[serde(default = "default_true")]
    pub allow_staking: bool,

    /// Deployment time in seconds since the Unix epoch. Starts the first
    /// sanitisation interval; 0 leaves the first sanitisation open.
    #[serde(default)]
    pub deployed_at: u64,

    /// Contract economics (fixed at deployment, not read from TOML).
    #[serde(skip)]
    pub params: EconomicParams,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_owner() -> Address {
    Address::from_low_u64(0x0001)
}

fn default_pool() -> Address {
    Address::from_low_u64(0x0f00)
}

fn default_staking_contract() -> Address {
    Address::from_low_u64(0x5747)
}

fn default_initial_supply() -> u64 {
    10_000_000
}

fn default_initial_liquidity() -> u64 {
    3_190_000
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse().map_err(NodeError::Config)
    }

    /// Initial supply in raw units.
    pub fn initial_supply_raw(&self) -> Result<u128, NodeError> {
        TokenAmount::checked_from_tokens(self.initial_supply.into())
            .map(|a| a.raw())
            .ok_or_else(|| NodeError::Config("initial_supply overflows".into()))
    }

    /// Initial pool liquidity in raw units.
    pub fn initial_liquidity_raw(&self) -> Result<u128, NodeError> {
        TokenAmount::checked_from_tokens(self.initial_liquidity.into())
            .map(|a| a.raw())
            .ok_or_else(|| NodeError::Config("initial_liquidity overflows".into()))
    }

    /// Reject configurations that cannot be deployed.
    pub fn validate(&self) -> Result<(), NodeError> {
        let roles = [
            ("owner", self.owner),
            ("uniswap_pool", self.uniswap_pool),
            ("staking_contract", self.staking_contract),
        ];
        for (name, addr) in roles {
            if addr.is_zero() {
                return Err(NodeError::Config(format!("{name} must not be the zero address")));
            }
        }
        if self.owner == self.uniswap_pool
            || self.owner == self.staking_contract
            || self.uniswap_pool == self.staking_contract
        {
            return Err(NodeError::Config(
                "owner, uniswap_pool and staking_contract must be distinct".into(),
            ));
        }
        if self.initial_supply == 0 {
            return Err(NodeError::Config("initial_supply must be positive".into()));
        }
        if self.initial_liquidity > self.initial_supply {
            return Err(NodeError::Config(format!(
                "initial_liquidity {} exceeds initial_supply {}",
                self.initial_liquidity, self.initial_supply
            )));
        }

        let p = &self.params;
        if p.transfer_tax_pct > 100 || p.unstake_tax_pct > 100 || p.burn_rate_pct > 100 {
            return Err(NodeError::Config("tax and burn rates are percentages".into()));
        }
        if p.caller_reward_pct + p.pool_reward_pct > 100 {
            return Err(NodeError::Config(
                "caller and pool rewards exceed the burned amount".into(),
            ));
        }
        if p.share_precision == 0 {
            return Err(NodeError::Config("share_precision must be positive".into()));
        }

        self.log_format()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            initial_supply: default_initial_supply(),
            uniswap_pool: default_pool(),
            staking_contract: default_staking_contract(),
            initial_liquidity: default_initial_liquidity(),
            tax_enabled: true,
            allow_staking: true,
            deployed_at: 0,
            params: EconomicParams::default(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
