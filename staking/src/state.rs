//! Per-staker and global staking state.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tws_types::Timestamp;

/// Token·seconds accrued by `staked` tokens over `elapsed_secs`.
///
/// A `u128` amount times a `u64` duration stays below 2^192, so the product
/// always fits.
pub fn token_time(staked: u128, elapsed_secs: u64) -> U256 {
    U256::from(staked) * U256::from(elapsed_secs)
}

/// Staking state for a single account.
///
/// Slots are created on first stake and reset (never removed) on unstake.
/// Invariant: `staked_tokens == 0` implies `total_staked_token_time == 0`
/// and `last_accounting_timestamp == Timestamp::EPOCH`. A staked account
/// always carries the real instant it was last accounted, which may itself
/// be the epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerInfo {
    /// Tokens currently staked, including compounded rewards.
    pub staked_tokens: u128,

    /// Cumulative token·seconds since the staker entered.
    pub total_staked_token_time: U256,

    /// When `total_staked_token_time` was last brought up to date.
    pub last_accounting_timestamp: Timestamp,

    /// Burn epoch of the last reward claim (0 = none since entering).
    pub last_reward_claimed_burn_id: u64,
}

impl StakerInfo {
    pub fn is_staked(&self) -> bool {
        self.staked_tokens > 0
    }

    /// Token·seconds this staker would have if accounted at `now`.
    pub fn projected_token_time(&self, now: Timestamp) -> Option<U256> {
        let elapsed = self.last_accounting_timestamp.elapsed_since(now);
        self.total_staked_token_time
            .checked_add(token_time(self.staked_tokens, elapsed))
    }
}

/// Aggregates shared by all stakers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStakingState {
    /// Sum of `staked_tokens` over all stakers.
    pub total_staked_tokens: u128,

    /// Global token·seconds, accrued from `total_staked_tokens` as time passes.
    /// Equals the sum of every staker's token·seconds projected to the same instant.
    pub total_staked_token_time: U256,

    /// When `total_staked_token_time` was last brought up to date.
    pub last_accounting_timestamp: Timestamp,

    /// Tokens held in custody for distribution to stakers.
    pub reward_pool: u128,

    /// When the pool was last sanitised (initially the deployment time).
    /// `None` leaves the first sanitisation ungated.
    pub last_sanitise_timestamp: Option<Timestamp>,

    /// Amount removed from the pool by the most recent sanitisation.
    pub last_burn_amount: u128,

    /// Incremented by every successful sanitisation.
    pub current_burn_id: u64,

    /// Admin gate for new stakes.
    pub allow_staking: bool,
}

impl GlobalStakingState {
    /// Global token·seconds if accounted at `now`.
    pub fn projected_token_time(&self, now: Timestamp) -> Option<U256> {
        let elapsed = self.last_accounting_timestamp.elapsed_since(now);
        self.total_staked_token_time
            .checked_add(token_time(self.total_staked_tokens, elapsed))
    }
}

/// Read-only snapshot returned by [`crate::StakingEngine::info`]:
/// one staker's figures next to the global ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingInfo {
    pub staked_tokens: u128,
    pub total_staked_token_time: U256,
    pub last_accounting_timestamp: Timestamp,
    pub last_reward_claimed_burn_id: u64,
    pub total_staked_tokens_global: u128,
    pub total_staked_token_time_global: U256,
    pub reward_pool: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_time_is_product() {
        assert_eq!(token_time(1000, 600), U256::from(600_000u64));
        assert_eq!(token_time(0, 600), U256::zero());
        assert_eq!(token_time(1000, 0), U256::zero());
    }

    #[test]
    fn token_time_holds_the_widest_product() {
        let widest = token_time(u128::MAX, u64::MAX);
        assert_eq!(widest, U256::from(u128::MAX) * U256::from(u64::MAX));
        assert!(widest > U256::from(u128::MAX));
    }

    #[test]
    fn default_staker_is_unstaked() {
        let info = StakerInfo::default();
        assert!(!info.is_staked());
        assert_eq!(info.last_accounting_timestamp, Timestamp::EPOCH);
        assert_eq!(info.projected_token_time(Timestamp::new(1_000)), Some(U256::zero()));
    }

    #[test]
    fn projected_token_time_adds_pending_accrual() {
        let info = StakerInfo {
            staked_tokens: 10,
            total_staked_token_time: U256::from(500u64),
            last_accounting_timestamp: Timestamp::new(100),
            last_reward_claimed_burn_id: 0,
        };
        assert_eq!(info.projected_token_time(Timestamp::new(150)), Some(U256::from(1_000u64)));
    }

    #[test]
    fn stake_accounted_at_epoch_still_accrues() {
        let info = StakerInfo {
            staked_tokens: 10,
            total_staked_token_time: U256::zero(),
            last_accounting_timestamp: Timestamp::EPOCH,
            last_reward_claimed_burn_id: 0,
        };
        assert_eq!(info.projected_token_time(Timestamp::new(20)), Some(U256::from(200u64)));
    }

    #[test]
    fn global_projection_uses_total_stake() {
        let global = GlobalStakingState {
            total_staked_tokens: 3,
            total_staked_token_time: U256::from(7u64),
            last_accounting_timestamp: Timestamp::new(10),
            ..Default::default()
        };
        assert_eq!(global.projected_token_time(Timestamp::new(20)), Some(U256::from(37u64)));
    }
}
