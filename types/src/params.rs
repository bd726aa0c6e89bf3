//! Economic parameters of the token and staking contracts.
//!
//! Percentages are whole percent applied as `amount × pct / 100` with
//! truncating integer division, matching the deployed contracts.

use crate::amount::TOKEN_UNIT;
use serde::{Deserialize, Serialize};

/// All tunable economics shared by the ledger and the staking engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicParams {
    // ── Token ────────────────────────────────────────────────────────────
    /// Transfer tax in percent, applied when tax is enabled and neither party
    /// is the staking contract.
    pub transfer_tax_pct: u128,

    // ── Staking ──────────────────────────────────────────────────────────
    /// Exit tax on unstake, in percent of the full stake. Feeds the reward pool.
    pub unstake_tax_pct: u128,

    /// Smallest accepted stake, in raw units.
    pub min_stake: u128,

    // ── Pool sanitisation ────────────────────────────────────────────────
    /// Share of the liquidity pool balance removed per sanitisation (percent).
    pub burn_rate_pct: u128,

    /// Share of the removed amount paid to the caller (percent).
    pub caller_reward_pct: u128,

    /// Share of the removed amount added to the staking reward pool (percent).
    pub pool_reward_pct: u128,

    /// Minimum seconds between two sanitisations. Default: 6 hours.
    pub sanitise_interval_secs: u64,

    // ── Rewards ──────────────────────────────────────────────────────────
    /// Reward pool size (raw) below which claims are refused. Default: 1 token.
    pub min_reward_pool: u128,

    /// Precision of a staker's share of the global token time.
    pub share_precision: u128,
}

impl EconomicParams {
    /// The parameters hard-coded in the deployed TWS contracts.
    pub fn tws_defaults() -> Self {
        Self {
            transfer_tax_pct: 1,

            unstake_tax_pct: 7,
            min_stake: 1,

            burn_rate_pct: 2,
            caller_reward_pct: 2,
            pool_reward_pct: 48,
            sanitise_interval_secs: 6 * 3600,

            min_reward_pool: TOKEN_UNIT,
            share_precision: 10_000, // basis points
        }
    }
}

impl Default for EconomicParams {
    fn default() -> Self {
        Self::tws_defaults()
    }
}
