//! Event records produced by the token ledger and the staking engine.
//!
//! The core only records events; publishing them to observers is the job of
//! the hosting layer.

use crate::address::Address;
use serde::{Deserialize, Serialize};

/// Everything the ledger and the staking engine report to the outside world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Tokens moved. `to == Address::ZERO` marks a burn. `amount` is what the
    /// recipient was credited (net of any transfer tax).
    Transferred {
        from: Address,
        to: Address,
        amount: u128,
    },
    /// An allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        amount: u128,
    },
    /// Transfer tax was switched on or off.
    TaxEnabledChanged { enabled: bool },
    /// A new staking contract was registered with the ledger.
    StakingContractChanged { staking_contract: Address },
    /// Staking was switched on or off.
    AllowStakingChanged { allowed: bool },
    /// A stake was deposited. `total` is the staker's stake afterwards.
    Staked {
        staker: Address,
        amount: u128,
        total: u128,
    },
    /// A staker left. `amount` is the pre-tax stake, `tax` went to the reward pool.
    Unstaked {
        staker: Address,
        amount: u128,
        tax: u128,
    },
    /// The liquidity pool was sanitised.
    PoolSanitised {
        caller: Address,
        burned: u128,
        caller_reward: u128,
        pool_reward: u128,
        total_supply: u128,
        pool_balance: u128,
    },
    /// A staker claimed (and compounded) a reward. `reward_pool` is what remains.
    RewardClaimed {
        staker: Address,
        amount: u128,
        reward_pool: u128,
    },
}

/// An append-only journal of events awaiting collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn as_slice(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return every recorded event, oldest first.
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
