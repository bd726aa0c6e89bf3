//! Core staking engine.

use std::collections::HashMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tws_token::TokenLedger;
use tws_types::{Address, EconomicParams, EventLog, LedgerEvent, Timestamp};

use crate::error::StakingError;
use crate::state::{token_time, GlobalStakingState, StakerInfo, StakingInfo};

/// Accrual results computed ahead of a mutation.
#[derive(Clone, Copy, Debug)]
struct Accrual {
    global_token_time: U256,
    staker_token_time: U256,
}

/// Split of one pool sanitisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SanitiseSplit {
    burn_amount: u128,
    caller_reward: u128,
    pool_reward: u128,
    final_burn: u128,
}

/// The staking engine: stakes, accrual, sanitisation and rewards.
///
/// The engine never owns the token ledger. Every operation that moves tokens
/// takes `&mut TokenLedger`, and the engine must be registered as the
/// ledger's staking contract for those moves to be tax-exempt and authorized.
///
/// All operations validate and compute before their first mutation: an error
/// leaves both the engine and the ledger exactly as they were.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakingEngine {
    /// Custody account; must match the ledger's staking contract.
    address: Address,
    /// Privileged account allowed to toggle staking.
    owner: Address,
    /// The liquidity pool sanitised by [`StakingEngine::sanitise_pool`].
    uniswap_pool: Address,
    params: EconomicParams,
    /// Per-account staking state.
    pub stakers: HashMap<Address, StakerInfo>,
    global: GlobalStakingState,
    #[serde(skip)]
    events: EventLog,
}

impl StakingEngine {
    /// Create an engine with the TWS default economics.
    ///
    /// `deployed_at` starts the first sanitisation interval; pass
    /// `Timestamp::EPOCH` to allow an immediate first sanitisation.
    pub fn new(address: Address, owner: Address, uniswap_pool: Address, deployed_at: Timestamp) -> Self {
        Self::with_params(address, owner, uniswap_pool, EconomicParams::default(), deployed_at)
    }

    pub fn with_params(
        address: Address,
        owner: Address,
        uniswap_pool: Address,
        params: EconomicParams,
        deployed_at: Timestamp,
    ) -> Self {
        info!(%address, %owner, %uniswap_pool, %deployed_at, "staking engine created");
        Self {
            address,
            owner,
            uniswap_pool,
            params,
            stakers: HashMap::new(),
            global: GlobalStakingState {
                last_sanitise_timestamp: (!deployed_at.is_epoch()).then_some(deployed_at),
                ..Default::default()
            },
            events: EventLog::new(),
        }
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn uniswap_pool(&self) -> Address {
        self.uniswap_pool
    }

    pub fn params(&self) -> &EconomicParams {
        &self.params
    }

    pub fn global(&self) -> &GlobalStakingState {
        &self.global
    }

    pub fn staker(&self, staker: &Address) -> Option<&StakerInfo> {
        self.stakers.get(staker)
    }

    pub fn reward_pool(&self) -> u128 {
        self.global.reward_pool
    }

    pub fn current_burn_id(&self) -> u64 {
        self.global.current_burn_id
    }

    /// `None` until the first sanitisation when deployed at the epoch.
    pub fn last_sanitise_timestamp(&self) -> Option<Timestamp> {
        self.global.last_sanitise_timestamp
    }

    pub fn allow_staking(&self) -> bool {
        self.global.allow_staking
    }

    /// A staker's figures next to the global aggregates.
    pub fn info(&self, staker: &Address) -> StakingInfo {
        let s = self.stakers.get(staker).cloned().unwrap_or_default();
        StakingInfo {
            staked_tokens: s.staked_tokens,
            total_staked_token_time: s.total_staked_token_time,
            last_accounting_timestamp: s.last_accounting_timestamp,
            last_reward_claimed_burn_id: s.last_reward_claimed_burn_id,
            total_staked_tokens_global: self.global.total_staked_tokens,
            total_staked_token_time_global: self.global.total_staked_token_time,
            reward_pool: self.global.reward_pool,
        }
    }

    /// Amount removed from the pool by the most recent sanitisation
    /// (0 before the first one).
    pub fn burn_amount(&self) -> u128 {
        self.global.last_burn_amount
    }

    /// Amount the next sanitisation would remove from the pool
    /// (`pool × burn_rate / 100`).
    pub fn next_burn_amount(&self, ledger: &TokenLedger) -> u128 {
        ledger
            .balance_of(&self.uniswap_pool)
            .saturating_mul(self.params.burn_rate_pct)
            / 100
    }

    pub fn events(&self) -> &[LedgerEvent] {
        self.events.as_slice()
    }

    /// Remove and return every event recorded since the last call.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    // ── Accrual ─────────────────────────────────────────────────────────

    /// Bring global and per-staker token·seconds up to `now`.
    ///
    /// Global: `total_staked_tokens × (now − last)` is added to the global
    /// token time. Staker: if staked, `staked_tokens × (now − last)` is added
    /// to the staker's token time.
    /// Both timestamps are set to `now`; an account that is not staked gets
    /// no slot. Repeating the call at the same instant changes nothing.
    pub fn accrue(&mut self, staker: &Address, now: Timestamp) -> Result<(), StakingError> {
        let accrual = self.plan_accrual(staker, now)?;
        if self.stakers.get(staker).is_some_and(StakerInfo::is_staked) {
            self.commit_accrual(staker, accrual, now);
        } else {
            self.global.total_staked_token_time = accrual.global_token_time;
            self.global.last_accounting_timestamp = now;
        }
        Ok(())
    }

    fn plan_accrual(&self, staker: &Address, now: Timestamp) -> Result<Accrual, StakingError> {
        let last = self.global.last_accounting_timestamp;
        let elapsed = last
            .checked_elapsed(now)
            .ok_or(StakingError::ClockRegression { last, now })?;
        let global_token_time = self
            .global
            .total_staked_token_time
            .checked_add(token_time(self.global.total_staked_tokens, elapsed))
            .ok_or(StakingError::Overflow)?;

        let info = self.stakers.get(staker).cloned().unwrap_or_default();
        let staker_token_time = if info.is_staked() {
            let last = info.last_accounting_timestamp;
            let elapsed = last
                .checked_elapsed(now)
                .ok_or(StakingError::ClockRegression { last, now })?;
            info.total_staked_token_time
                .checked_add(token_time(info.staked_tokens, elapsed))
                .ok_or(StakingError::Overflow)?
        } else {
            info.total_staked_token_time
        };

        Ok(Accrual {
            global_token_time,
            staker_token_time,
        })
    }

    fn commit_accrual(&mut self, staker: &Address, accrual: Accrual, now: Timestamp) {
        self.global.total_staked_token_time = accrual.global_token_time;
        self.global.last_accounting_timestamp = now;
        let info = self.stakers.entry(*staker).or_default();
        info.total_staked_token_time = accrual.staker_token_time;
        info.last_accounting_timestamp = now;
    }

    // ── Staker operations ───────────────────────────────────────────────

    /// Lock `amount` of the staker's tokens in the engine's custody.
    ///
    /// The staker must have approved the engine for at least `amount`.
    pub fn stake(
        &mut self,
        staker: Address,
        amount: u128,
        ledger: &mut TokenLedger,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if !self.global.allow_staking {
            return Err(StakingError::StakingDisabled);
        }
        if amount < self.params.min_stake {
            return Err(StakingError::BelowMinimum {
                amount,
                minimum: self.params.min_stake,
            });
        }
        let available = ledger.balance_of(&staker);
        if available < amount {
            return Err(StakingError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.ensure_registered(ledger)?;

        let accrual = self.plan_accrual(&staker, now)?;
        let current = self.stakers.get(&staker).map_or(0, |s| s.staked_tokens);
        let staked = current.checked_add(amount).ok_or(StakingError::Overflow)?;
        let global_staked = self
            .global
            .total_staked_tokens
            .checked_add(amount)
            .ok_or(StakingError::Overflow)?;

        ledger.transfer_from(self.address, staker, self.address, amount)?;

        self.commit_accrual(&staker, accrual, now);
        if let Some(info) = self.stakers.get_mut(&staker) {
            info.staked_tokens = staked;
        }
        self.global.total_staked_tokens = global_staked;
        self.events.record(LedgerEvent::Staked {
            staker,
            amount,
            total: staked,
        });
        debug!(%staker, amount, total = staked, %now, "stake");
        Ok(())
    }

    /// Withdraw the whole stake, minus the exit tax which goes to the reward pool.
    ///
    /// Returns the amount paid back to the staker.
    pub fn unstake(
        &mut self,
        staker: Address,
        ledger: &mut TokenLedger,
        now: Timestamp,
    ) -> Result<u128, StakingError> {
        let staked = self
            .stakers
            .get(&staker)
            .filter(|s| s.is_staked())
            .map(|s| s.staked_tokens)
            .ok_or(StakingError::NotStaked(staker))?;
        self.ensure_registered(ledger)?;

        let accrual = self.plan_accrual(&staker, now)?;
        let tax = staked
            .checked_mul(self.params.unstake_tax_pct)
            .ok_or(StakingError::Overflow)?
            / 100;
        let payout = staked - tax;
        let reward_pool = self
            .global
            .reward_pool
            .checked_add(tax)
            .ok_or(StakingError::Overflow)?;
        let global_staked = self
            .global
            .total_staked_tokens
            .checked_sub(staked)
            .ok_or(StakingError::Overflow)?;
        let global_token_time = accrual
            .global_token_time
            .checked_sub(accrual.staker_token_time)
            .ok_or(StakingError::Overflow)?;

        ledger.transfer(self.address, staker, payout)?;

        self.global.total_staked_token_time = global_token_time;
        self.global.last_accounting_timestamp = now;
        self.global.total_staked_tokens = global_staked;
        self.global.reward_pool = reward_pool;
        self.stakers.insert(staker, StakerInfo::default());
        self.events.record(LedgerEvent::Unstaked {
            staker,
            amount: staked,
            tax,
        });
        debug!(%staker, amount = staked, tax, payout, %now, "unstake");
        Ok(payout)
    }

    /// Sanitise the liquidity pool: burn part of it, pay the caller, fund the
    /// reward pool. At most once per `sanitise_interval_secs`.
    pub fn sanitise_pool(
        &mut self,
        caller: Address,
        ledger: &mut TokenLedger,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if let Some(last) = self.global.last_sanitise_timestamp {
            let elapsed = last
                .checked_elapsed(now)
                .ok_or(StakingError::ClockRegression { last, now })?;
            if elapsed < self.params.sanitise_interval_secs {
                return Err(StakingError::TooSoon {
                    elapsed,
                    required: self.params.sanitise_interval_secs,
                });
            }
        }
        self.ensure_registered(ledger)?;
        if caller.is_zero() {
            return Err(tws_token::TokenError::InvalidRecipient.into());
        }

        let split = self.plan_sanitise(ledger)?;
        let reward_pool = self
            .global
            .reward_pool
            .checked_add(split.pool_reward)
            .ok_or(StakingError::Overflow)?;
        let burn_id = self
            .global
            .current_burn_id
            .checked_add(1)
            .ok_or(StakingError::Overflow)?;

        // The pool holds at least `burn_amount`, so once the burn succeeds
        // both reward transfers are covered.
        ledger.burn(self.address, split.final_burn)?;
        ledger.transfer_reward(self.address, caller, split.caller_reward)?;
        ledger.transfer_reward(self.address, self.address, split.pool_reward)?;

        self.global.reward_pool = reward_pool;
        self.global.last_sanitise_timestamp = Some(now);
        self.global.last_burn_amount = split.burn_amount;
        self.global.current_burn_id = burn_id;

        let total_supply = ledger.total_supply();
        let pool_balance = ledger.balance_of(&self.uniswap_pool);
        self.events.record(LedgerEvent::PoolSanitised {
            caller,
            burned: split.final_burn,
            caller_reward: split.caller_reward,
            pool_reward: split.pool_reward,
            total_supply,
            pool_balance,
        });
        info!(
            %caller,
            burn_id,
            removed = split.burn_amount,
            burned = split.final_burn,
            caller_reward = split.caller_reward,
            pool_reward = split.pool_reward,
            total_supply,
            pool_balance,
            "pool sanitised"
        );
        Ok(())
    }

    fn plan_sanitise(&self, ledger: &TokenLedger) -> Result<SanitiseSplit, StakingError> {
        let pool_balance = ledger.balance_of(&self.uniswap_pool);
        let pct = |amount: u128, pct: u128| {
            amount
                .checked_mul(pct)
                .map(|v| v / 100)
                .ok_or(StakingError::Overflow)
        };
        let burn_amount = pct(pool_balance, self.params.burn_rate_pct)?;
        let caller_reward = pct(burn_amount, self.params.caller_reward_pct)?;
        let pool_reward = pct(burn_amount, self.params.pool_reward_pct)?;
        let final_burn = burn_amount
            .checked_sub(caller_reward)
            .and_then(|rest| rest.checked_sub(pool_reward))
            .ok_or(StakingError::Overflow)?;
        Ok(SanitiseSplit {
            burn_amount,
            caller_reward,
            pool_reward,
            final_burn,
        })
    }

    /// Claim this burn epoch's share of the reward pool, compounding it into
    /// the stake. Returns the reward amount.
    ///
    /// The share is `staker_time × precision / global_time`; the reward is
    /// `reward_pool × share / precision`. The reward never leaves custody and
    /// earns token·seconds only from the next accrual onward.
    pub fn claim_reward(&mut self, staker: Address, now: Timestamp) -> Result<u128, StakingError> {
        if self.global.reward_pool < self.params.min_reward_pool {
            return Err(StakingError::RewardPoolTooSmall {
                pool: self.global.reward_pool,
                minimum: self.params.min_reward_pool,
            });
        }
        let info = self
            .stakers
            .get(&staker)
            .filter(|s| s.is_staked())
            .cloned()
            .ok_or(StakingError::NotStaked(staker))?;
        let burn_id = self.global.current_burn_id;
        if info.last_reward_claimed_burn_id == burn_id {
            return Err(StakingError::AlreadyClaimed { burn_id });
        }

        let accrual = self.plan_accrual(&staker, now)?;
        let precision = U256::from(self.params.share_precision);
        let share = if accrual.global_token_time.is_zero() {
            U256::zero()
        } else {
            accrual
                .staker_token_time
                .checked_mul(precision)
                .ok_or(StakingError::Overflow)?
                / accrual.global_token_time
        };
        let reward = U256::from(self.global.reward_pool)
            .checked_mul(share)
            .ok_or(StakingError::Overflow)?
            / precision;
        let reward = u128::try_from(reward).map_err(|_| StakingError::Overflow)?;
        let reward_pool = self
            .global
            .reward_pool
            .checked_sub(reward)
            .ok_or(StakingError::Overflow)?;
        let staked = info
            .staked_tokens
            .checked_add(reward)
            .ok_or(StakingError::Overflow)?;
        let global_staked = self
            .global
            .total_staked_tokens
            .checked_add(reward)
            .ok_or(StakingError::Overflow)?;

        self.commit_accrual(&staker, accrual, now);
        self.global.reward_pool = reward_pool;
        self.global.total_staked_tokens = global_staked;
        if let Some(info) = self.stakers.get_mut(&staker) {
            info.staked_tokens = staked;
            info.last_reward_claimed_burn_id = burn_id;
        }
        self.events.record(LedgerEvent::RewardClaimed {
            staker,
            amount: reward,
            reward_pool,
        });
        debug!(%staker, reward, %share, reward_pool, burn_id, %now, "reward claimed");
        Ok(reward)
    }

    // ── Admin ───────────────────────────────────────────────────────────

    pub fn set_allow_staking(&mut self, caller: Address, allowed: bool) -> Result<(), StakingError> {
        if caller != self.owner {
            return Err(StakingError::Unauthorized(caller));
        }
        self.global.allow_staking = allowed;
        self.events.record(LedgerEvent::AllowStakingChanged { allowed });
        info!(allowed, "staking toggled");
        Ok(())
    }

    // ── Consistency ─────────────────────────────────────────────────────

    /// Sum of every staker's stake. Equals the global total in a consistent engine.
    pub fn staked_sum(&self) -> Option<u128> {
        self.stakers
            .values()
            .try_fold(0u128, |acc, s| acc.checked_add(s.staked_tokens))
    }

    /// Sum of every staker's token·seconds projected to `now`.
    pub fn projected_token_time_sum(&self, now: Timestamp) -> Option<U256> {
        self.stakers.values().try_fold(U256::zero(), |acc, s| {
            acc.checked_add(s.projected_token_time(now)?)
        })
    }

    fn ensure_registered(&self, ledger: &TokenLedger) -> Result<(), StakingError> {
        if ledger.staking_contract() != self.address {
            return Err(StakingError::Unauthorized(self.address));
        }
        Ok(())
    }
}
