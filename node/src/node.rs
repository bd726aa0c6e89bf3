//! The TWS node: one ledger, one staking engine, one writer.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tws_staking::{StakingEngine, StakingInfo};
use tws_token::TokenLedger;
use tws_types::{Address, Clock, LedgerEvent, Timestamp, TokenAmount};
use tws_utils::time_until_next_sanitise;

use crate::command::{Command, Outcome};
use crate::config::NodeConfig;
use crate::ledger_event::EventBus;
use crate::metrics::{GaugeReadings, NodeMetrics};
use crate::NodeError;

/// Bumped whenever [`NodeState`]'s encoding changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Everything the lock protects.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct NodeState {
    ledger: TokenLedger,
    engine: StakingEngine,
}

impl NodeState {
    /// Ledger events first: within one operation the engine only records
    /// after its token moves have succeeded.
    fn drain_events(&mut self) -> Vec<LedgerEvent> {
        let mut events = self.ledger.take_events();
        events.extend(self.engine.take_events());
        events
    }

    fn readings(&self) -> GaugeReadings {
        GaugeReadings {
            total_supply: self.ledger.total_supply(),
            pool_balance: self.ledger.balance_of(&self.ledger.uniswap_pool()),
            total_staked: self.engine.global().total_staked_tokens,
            reward_pool: self.engine.reward_pool(),
            stakers: self.engine.stakers.values().filter(|s| s.is_staked()).count(),
            burn_id: self.engine.current_burn_id(),
        }
    }

    fn check_invariants(&self, now: Timestamp) -> Result<(), NodeError> {
        let violation = |msg: String| Err(NodeError::Invariant(msg));

        let supply = self.ledger.total_supply();
        if self.ledger.balances_total() != Some(supply) {
            return violation(format!(
                "balances sum to {:?}, total supply is {supply}",
                self.ledger.balances_total()
            ));
        }

        let global = self.engine.global();
        if self.engine.staked_sum() != Some(global.total_staked_tokens) {
            return violation(format!(
                "stakes sum to {:?}, global stake is {}",
                self.engine.staked_sum(),
                global.total_staked_tokens
            ));
        }

        // Every staker accrual also stamps the global clock, so projecting to
        // the later of the two covers all pending accruals.
        let at = now.max(global.last_accounting_timestamp);
        let projected = global.projected_token_time(at);
        if self.engine.projected_token_time_sum(at) != projected {
            return violation(format!(
                "staker token time sums to {:?}, global is {projected:?} at {at}",
                self.engine.projected_token_time_sum(at)
            ));
        }

        for (addr, info) in &self.engine.stakers {
            if !info.is_staked()
                && (!info.total_staked_token_time.is_zero() || !info.last_accounting_timestamp.is_epoch())
            {
                return violation(format!("unstaked account {addr} carries accrual state"));
            }
        }

        let custody = self.ledger.balance_of(&self.engine.address());
        let owed = global
            .total_staked_tokens
            .checked_add(global.reward_pool)
            .ok_or_else(|| NodeError::Invariant("stake plus reward pool overflows".into()))?;
        if custody < owed {
            return violation(format!("custody holds {custody}, owes {owed}"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    taken_at: Timestamp,
    state: NodeState,
}

/// Headline figures of a running node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub now: Timestamp,
    pub owner: Address,
    pub uniswap_pool: Address,
    pub staking_contract: Address,
    pub total_supply: TokenAmount,
    pub pool_balance: TokenAmount,
    pub custody_balance: TokenAmount,
    pub total_staked: TokenAmount,
    pub reward_pool: TokenAmount,
    pub stakers: usize,
    pub holders: usize,
    pub tax_enabled: bool,
    pub allow_staking: bool,
    pub current_burn_id: u64,
    pub last_sanitise: Option<Timestamp>,
    /// Seconds until the pool may be sanitised again.
    pub next_sanitise_in: u64,
}

/// Hosts the token ledger and the staking engine.
///
/// Every operation takes the state lock, reads `now` from the clock (or
/// takes it explicitly via the `*_at` variants), runs against the core,
/// drains the recorded events and releases the lock before publishing
/// them on the [`EventBus`].
pub struct TwsNode {
    config: NodeConfig,
    state: Mutex<NodeState>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    metrics: Option<NodeMetrics>,
}

impl TwsNode {
    /// Deploy a fresh token and staking engine.
    ///
    /// Mints the supply to the owner, seeds the pool, creates the engine,
    /// registers it as the ledger's staking contract, then applies the
    /// staking and tax flags (tax last, so the seeding is untaxed).
    pub fn deploy(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, NodeError> {
        config.validate()?;
        let owner = config.owner;
        let pool = config.uniswap_pool;

        let mut ledger =
            TokenLedger::with_params(owner, config.initial_supply_raw()?, pool, &config.params);
        ledger.transfer(owner, pool, config.initial_liquidity_raw()?)?;

        let mut engine = StakingEngine::with_params(
            config.staking_contract,
            owner,
            pool,
            config.params.clone(),
            Timestamp::new(config.deployed_at),
        );
        ledger.set_staking_contract(owner, config.staking_contract)?;
        engine.set_allow_staking(owner, config.allow_staking)?;
        ledger.set_tax_enabled(owner, config.tax_enabled)?;

        let mut state = NodeState { ledger, engine };
        let deploy_events = state.drain_events();
        let metrics = if config.enable_metrics {
            let metrics = NodeMetrics::new()?;
            metrics.set_gauges(&state.readings());
            Some(metrics)
        } else {
            None
        };

        info!(
            %owner,
            %pool,
            staking_contract = %config.staking_contract,
            supply = config.initial_supply,
            liquidity = config.initial_liquidity,
            tax_enabled = config.tax_enabled,
            allow_staking = config.allow_staking,
            events = deploy_events.len(),
            "TWS deployed"
        );

        Ok(Self {
            config,
            state: Mutex::new(state),
            clock,
            events: EventBus::new(),
            metrics,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&NodeMetrics> {
        self.metrics.as_ref()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Register a listener for every event recorded from now on.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    fn lock(&self) -> Result<MutexGuard<'_, NodeState>, NodeError> {
        self.state.lock().map_err(|_| NodeError::Poisoned)
    }

    /// Run `f` under the state lock, then publish events and update metrics.
    fn run<T, F>(&self, op: &'static str, now: Timestamp, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&mut NodeState, Timestamp) -> Result<T, NodeError>,
    {
        let started = Instant::now();
        let (result, events, readings) = {
            let mut state = self.lock()?;
            let result = f(&mut state, now);
            let events = state.drain_events();
            (result, events, state.readings())
        };
        let micros = started.elapsed().as_secs_f64() * 1e6;

        match &result {
            Ok(_) => debug!(op, %now, events = events.len(), "operation applied"),
            Err(e) => warn!(op, %now, error = %e, "operation rejected"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe(op, result.is_ok(), micros);
            metrics.set_gauges(&readings);
        }
        for event in &events {
            self.events.emit(event);
        }
        result
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Apply a command at the clock's current time.
    pub fn execute(&self, command: Command) -> Result<Outcome, NodeError> {
        self.execute_at(command, self.clock.now())
    }

    /// Apply a command at an explicit instant (used when replaying a log).
    pub fn execute_at(&self, command: Command, now: Timestamp) -> Result<Outcome, NodeError> {
        let op = command.name();
        self.run(op, now, move |s, now| {
            let outcome = match command {
                Command::Transfer { from, to, amount } => {
                    let net = s.ledger.transfer(from, to, amount.raw())?;
                    Outcome::Transferred { net: net.into() }
                }
                Command::TransferFrom {
                    spender,
                    from,
                    to,
                    amount,
                } => {
                    let net = s.ledger.transfer_from(spender, from, to, amount.raw())?;
                    Outcome::Transferred { net: net.into() }
                }
                Command::Approve {
                    owner,
                    spender,
                    amount,
                } => {
                    s.ledger.approve(owner, spender, amount.raw());
                    Outcome::Applied
                }
                Command::SetTaxEnabled { caller, enabled } => {
                    s.ledger.set_tax_enabled(caller, enabled)?;
                    Outcome::Applied
                }
                Command::SetStakingContract {
                    caller,
                    staking_contract,
                } => {
                    s.ledger.set_staking_contract(caller, staking_contract)?;
                    Outcome::Applied
                }
                Command::SetAllowStaking { caller, allowed } => {
                    s.engine.set_allow_staking(caller, allowed)?;
                    Outcome::Applied
                }
                Command::Stake { staker, amount } => {
                    s.engine.stake(staker, amount.raw(), &mut s.ledger, now)?;
                    Outcome::Applied
                }
                Command::Unstake { staker } => {
                    let payout = s.engine.unstake(staker, &mut s.ledger, now)?;
                    Outcome::Unstaked {
                        payout: payout.into(),
                    }
                }
                Command::SanitisePool { caller } => {
                    s.engine.sanitise_pool(caller, &mut s.ledger, now)?;
                    Outcome::Applied
                }
                Command::ClaimReward { staker } => {
                    let reward = s.engine.claim_reward(staker, now)?;
                    Outcome::RewardClaimed {
                        reward: reward.into(),
                    }
                }
                Command::Accrue { staker } => {
                    s.engine.accrue(&staker, now)?;
                    Outcome::Applied
                }
            };
            Ok(outcome)
        })
    }

    // ── Typed operations ────────────────────────────────────────────────

    /// Returns the amount credited to `to`.
    pub fn transfer(&self, from: Address, to: Address, amount: u128) -> Result<u128, NodeError> {
        self.run("transfer", self.clock.now(), |s, _| {
            Ok(s.ledger.transfer(from, to, amount)?)
        })
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<u128, NodeError> {
        self.run("transfer_from", self.clock.now(), |s, _| {
            Ok(s.ledger.transfer_from(spender, from, to, amount)?)
        })
    }

    pub fn approve(&self, owner: Address, spender: Address, amount: u128) -> Result<(), NodeError> {
        self.run("approve", self.clock.now(), |s, _| {
            s.ledger.approve(owner, spender, amount);
            Ok(())
        })
    }

    pub fn set_tax_enabled(&self, caller: Address, enabled: bool) -> Result<(), NodeError> {
        self.run("set_tax_enabled", self.clock.now(), |s, _| {
            Ok(s.ledger.set_tax_enabled(caller, enabled)?)
        })
    }

    pub fn set_staking_contract(&self, caller: Address, staking_contract: Address) -> Result<(), NodeError> {
        self.run("set_staking_contract", self.clock.now(), |s, _| {
            Ok(s.ledger.set_staking_contract(caller, staking_contract)?)
        })
    }

    pub fn set_allow_staking(&self, caller: Address, allowed: bool) -> Result<(), NodeError> {
        self.run("set_allow_staking", self.clock.now(), |s, _| {
            Ok(s.engine.set_allow_staking(caller, allowed)?)
        })
    }

    pub fn stake(&self, staker: Address, amount: u128) -> Result<(), NodeError> {
        self.run("stake", self.clock.now(), |s, now| {
            Ok(s.engine.stake(staker, amount, &mut s.ledger, now)?)
        })
    }

    /// Returns the amount paid back after the exit tax.
    pub fn unstake(&self, staker: Address) -> Result<u128, NodeError> {
        self.run("unstake", self.clock.now(), |s, now| {
            Ok(s.engine.unstake(staker, &mut s.ledger, now)?)
        })
    }

    pub fn sanitise_pool(&self, caller: Address) -> Result<(), NodeError> {
        self.run("sanitise_pool", self.clock.now(), |s, now| {
            Ok(s.engine.sanitise_pool(caller, &mut s.ledger, now)?)
        })
    }

    /// Returns the reward compounded into the stake.
    pub fn claim_reward(&self, staker: Address) -> Result<u128, NodeError> {
        self.run("claim_reward", self.clock.now(), |s, now| {
            Ok(s.engine.claim_reward(staker, now)?)
        })
    }

    pub fn accrue(&self, staker: Address) -> Result<(), NodeError> {
        self.run("accrue", self.clock.now(), |s, now| {
            Ok(s.engine.accrue(&staker, now)?)
        })
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn balance_of(&self, account: &Address) -> Result<u128, NodeError> {
        Ok(self.lock()?.ledger.balance_of(account))
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<u128, NodeError> {
        Ok(self.lock()?.ledger.allowance(owner, spender))
    }

    pub fn total_supply(&self) -> Result<u128, NodeError> {
        Ok(self.lock()?.ledger.total_supply())
    }

    pub fn staking_info(&self, staker: &Address) -> Result<StakingInfo, NodeError> {
        Ok(self.lock()?.engine.info(staker))
    }

    pub fn reward_pool(&self) -> Result<u128, NodeError> {
        Ok(self.lock()?.engine.reward_pool())
    }

    /// Amount removed by the most recent sanitisation.
    pub fn burn_amount(&self) -> Result<u128, NodeError> {
        Ok(self.lock()?.engine.burn_amount())
    }

    /// Amount the next sanitisation would remove.
    pub fn next_burn_amount(&self) -> Result<u128, NodeError> {
        let state = self.lock()?;
        Ok(state.engine.next_burn_amount(&state.ledger))
    }

    pub fn summary(&self) -> Result<NodeSummary, NodeError> {
        self.summary_at(self.clock.now())
    }

    pub fn summary_at(&self, now: Timestamp) -> Result<NodeSummary, NodeError> {
        let state = self.lock()?;
        let readings = state.readings();
        let engine = &state.engine;
        Ok(NodeSummary {
            now,
            owner: state.ledger.owner(),
            uniswap_pool: state.ledger.uniswap_pool(),
            staking_contract: state.ledger.staking_contract(),
            total_supply: readings.total_supply.into(),
            pool_balance: readings.pool_balance.into(),
            custody_balance: state.ledger.balance_of(&engine.address()).into(),
            total_staked: readings.total_staked.into(),
            reward_pool: readings.reward_pool.into(),
            stakers: readings.stakers,
            holders: state.ledger.holders().count(),
            tax_enabled: state.ledger.tax_enabled(),
            allow_staking: engine.allow_staking(),
            current_burn_id: readings.burn_id,
            last_sanitise: engine.last_sanitise_timestamp(),
            next_sanitise_in: time_until_next_sanitise(
                engine.last_sanitise_timestamp(),
                engine.params().sanitise_interval_secs,
                now,
            ),
        })
    }

    // ── Consistency & persistence ───────────────────────────────────────

    /// Verify the cross-cutting accounting invariants at the current time.
    pub fn check_invariants(&self) -> Result<(), NodeError> {
        self.check_invariants_at(self.clock.now())
    }

    pub fn check_invariants_at(&self, now: Timestamp) -> Result<(), NodeError> {
        self.lock()?.check_invariants(now)
    }

    /// Encode the full ledger and engine state.
    pub fn snapshot(&self) -> Result<Vec<u8>, NodeError> {
        let state = self.lock()?.clone();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now(),
            state,
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Replace the current state with a snapshot.
    ///
    /// The snapshot must decode, carry the current version and pass the
    /// invariant checks; otherwise the running state is left untouched.
    pub fn restore(&self, bytes: &[u8]) -> Result<(), NodeError> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(NodeError::Serialization(format!(
                "snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        snapshot.state.check_invariants(snapshot.taken_at)?;

        let readings = snapshot.state.readings();
        *self.lock()? = snapshot.state;
        if let Some(metrics) = &self.metrics {
            metrics.set_gauges(&readings);
        }
        info!(taken_at = %snapshot.taken_at, "state restored from snapshot");
        Ok(())
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), NodeError> {
        let bytes = self.snapshot()?;
        std::fs::write(path.as_ref(), &bytes)?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<(), NodeError> {
        let bytes = std::fs::read(path)?;
        self.restore(&bytes)
    }
}
