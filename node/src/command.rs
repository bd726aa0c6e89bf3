//! Serializable command surface of the node.
//!
//! Amounts travel as [`TokenAmount`] (decimal strings, or `"N tokens"` when
//! parsed from text) so that values above 2^53 survive JSON.

use serde::{Deserialize, Serialize};
use tws_types::{Address, TokenAmount};

/// One state-changing operation with its caller identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Transfer {
        from: Address,
        to: Address,
        amount: TokenAmount,
    },
    TransferFrom {
        spender: Address,
        from: Address,
        to: Address,
        amount: TokenAmount,
    },
    Approve {
        owner: Address,
        spender: Address,
        amount: TokenAmount,
    },
    SetTaxEnabled {
        caller: Address,
        enabled: bool,
    },
    SetStakingContract {
        caller: Address,
        staking_contract: Address,
    },
    SetAllowStaking {
        caller: Address,
        allowed: bool,
    },
    Stake {
        staker: Address,
        amount: TokenAmount,
    },
    Unstake {
        staker: Address,
    },
    SanitisePool {
        caller: Address,
    },
    ClaimReward {
        staker: Address,
    },
    Accrue {
        staker: Address,
    },
}

impl Command {
    /// Stable operation name, used for metrics labels and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Transfer { .. } => "transfer",
            Command::TransferFrom { .. } => "transfer_from",
            Command::Approve { .. } => "approve",
            Command::SetTaxEnabled { .. } => "set_tax_enabled",
            Command::SetStakingContract { .. } => "set_staking_contract",
            Command::SetAllowStaking { .. } => "set_allow_staking",
            Command::Stake { .. } => "stake",
            Command::Unstake { .. } => "unstake",
            Command::SanitisePool { .. } => "sanitise_pool",
            Command::ClaimReward { .. } => "claim_reward",
            Command::Accrue { .. } => "accrue",
        }
    }
}

/// What a successful command produced beyond its events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// Amount credited to the recipient of a transfer.
    Transferred { net: TokenAmount },
    /// Amount paid back by an unstake.
    Unstaked { payout: TokenAmount },
    /// Reward compounded into the stake.
    RewardClaimed { reward: TokenAmount },
}
