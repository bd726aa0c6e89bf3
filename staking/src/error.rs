//! Staking-specific errors.

use thiserror::Error;
use tws_token::TokenError;
use tws_types::{Address, Timestamp};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("token ledger rejected the operation: {0}")]
    Token(#[from] TokenError),

    #[error("staking is currently disabled")]
    StakingDisabled,

    #[error("stake of {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: u128, minimum: u128 },

    #[error("amount is greater than sender's balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("{0} is not staked")]
    NotStaked(Address),

    #[error("only one sanitisation per interval: {elapsed}s elapsed, {required}s required")]
    TooSoon { elapsed: u64, required: u64 },

    #[error("reward pool of {pool} is below the claim minimum of {minimum}")]
    RewardPoolTooSmall { pool: u128, minimum: u128 },

    #[error("reward from burn {burn_id} already claimed")]
    AlreadyClaimed { burn_id: u64 },

    #[error("clock went backwards: last accounted at {last}, now {now}")]
    ClockRegression { last: Timestamp, now: Timestamp },

    #[error("arithmetic overflow in staking computation")]
    Overflow,
}
