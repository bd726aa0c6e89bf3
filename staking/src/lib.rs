//! TWS staking: the time-weighted reward engine.
//!
//! Stakers lock tokens in the engine's custody and accrue token·seconds.
//! Every six hours anyone may sanitise the liquidity pool: 2% of the pool is
//! removed, of which 2% goes to the caller, 48% to the reward pool and the
//! rest is burned. Stakers claim once per burn epoch, in proportion to their
//! share of the global token·seconds, and the reward is compounded into
//! their stake. Leaving costs a 7% exit tax that also feeds the reward pool.
//!
//! This crate handles:
//! - Per-staker and global token·second accrual
//! - Stake / unstake with exit tax
//! - Pool sanitisation (burn, caller incentive, reward pool funding)
//! - Reward claims gated by burn epoch

pub mod engine;
pub mod error;
pub mod state;

pub use engine::StakingEngine;
pub use error::StakingError;
pub use primitive_types::U256;
pub use state::{token_time, GlobalStakingState, StakerInfo, StakingInfo};
