//! The token ledger: balances, allowances and the transfer tax.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tws_types::{Address, EconomicParams, EventLog, LedgerEvent};

use crate::error::TokenError;

/// A validated balance movement, computed before anything is mutated.
#[derive(Clone, Copy, Debug)]
struct TransferPlan {
    from: Address,
    to: Address,
    /// Debited from the sender.
    gross: u128,
    /// Credited to the recipient.
    net: u128,
    /// Destroyed (`gross - net`).
    tax: u128,
}

/// The TWS token ledger.
///
/// Invariant: the sum of all balances equals `total_supply`. Taxed transfers
/// keep it by destroying the tax, so supply shrinks with every taxed transfer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Privileged account allowed to toggle tax and register the staking contract.
    owner: Address,
    /// The liquidity pool account: source of burns and staking rewards.
    uniswap_pool: Address,
    /// Tax-exempt account allowed to burn and pay rewards. Zero until registered.
    staking_contract: Address,
    tax_enabled: bool,
    transfer_tax_pct: u128,
    total_supply: u128,
    balances: HashMap<Address, u128>,
    /// owner → spender → remaining approved amount.
    allowances: HashMap<Address, HashMap<Address, u128>>,
    #[serde(skip)]
    events: EventLog,
}

impl TokenLedger {
    /// Create a ledger minting `initial_supply` to `owner`, with the default
    /// 1% transfer tax (disabled until the owner enables it).
    pub fn new(owner: Address, initial_supply: u128, uniswap_pool: Address) -> Self {
        Self::with_params(owner, initial_supply, uniswap_pool, &EconomicParams::default())
    }

    pub fn with_params(
        owner: Address,
        initial_supply: u128,
        uniswap_pool: Address,
        params: &EconomicParams,
    ) -> Self {
        let mut balances = HashMap::new();
        if initial_supply > 0 {
            balances.insert(owner, initial_supply);
        }
        let mut events = EventLog::new();
        events.record(LedgerEvent::Transferred {
            from: Address::ZERO,
            to: owner,
            amount: initial_supply,
        });
        info!(%owner, %uniswap_pool, supply = initial_supply, "token ledger created");
        Self {
            owner,
            uniswap_pool,
            staking_contract: Address::ZERO,
            tax_enabled: false,
            transfer_tax_pct: params.transfer_tax_pct,
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
            events,
        }
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn tax_enabled(&self) -> bool {
        self.tax_enabled
    }

    pub fn staking_contract(&self) -> Address {
        self.staking_contract
    }

    pub fn uniswap_pool(&self) -> Address {
        self.uniswap_pool
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Every account holding a non-zero balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter().filter(|(_, balance)| **balance > 0)
    }

    /// Sum of all balances, `None` on overflow. Equals `total_supply` in a
    /// consistent ledger.
    pub fn balances_total(&self) -> Option<u128> {
        self.balances
            .values()
            .try_fold(0u128, |acc, balance| acc.checked_add(*balance))
    }

    /// The tax a transfer of `amount` from `from` to `to` would pay right now.
    pub fn tax_for(&self, from: &Address, to: &Address, amount: u128) -> u128 {
        if self.is_tax_exempt(from, to) {
            0
        } else {
            amount.saturating_mul(self.transfer_tax_pct) / 100
        }
    }

    pub fn events(&self) -> &[LedgerEvent] {
        self.events.as_slice()
    }

    /// Remove and return every event recorded since the last call.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    // ── Transfers ───────────────────────────────────────────────────────

    /// Move `amount` from `from` to `to`, taxing it unless exempt.
    ///
    /// Returns the amount credited to `to`.
    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<u128, TokenError> {
        let plan = self.plan_transfer(from, to, amount)?;
        self.apply(plan);
        debug!(%from, %to, amount, net = plan.net, tax = plan.tax, "transfer");
        Ok(plan.net)
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`.
    ///
    /// The allowance is charged the full pre-tax amount.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<u128, TokenError> {
        let plan = self.plan_transfer(from, to, amount)?;
        let approved = self.allowance(&from, &spender);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                needed: amount,
                available: approved,
            });
        }
        self.allowances
            .entry(from)
            .or_default()
            .insert(spender, approved - amount);
        self.apply(plan);
        debug!(%spender, %from, %to, amount, net = plan.net, tax = plan.tax, "transfer_from");
        Ok(plan.net)
    }

    /// Set `spender`'s allowance over `owner`'s tokens, replacing any previous value.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.allowances.entry(owner).or_default().insert(spender, amount);
        self.events.record(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
        debug!(%owner, %spender, amount, "approve");
    }

    // ── Staking-contract primitives ─────────────────────────────────────

    /// Destroy `amount` from the liquidity pool. Staking contract only.
    pub fn burn(&mut self, caller: Address, amount: u128) -> Result<(), TokenError> {
        self.ensure_staking_contract(caller)?;
        let pool = self.uniswap_pool;
        let available = self.balance_of(&pool);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.balances.insert(pool, available - amount);
        self.total_supply -= amount;
        self.events.record(LedgerEvent::Transferred {
            from: pool,
            to: Address::ZERO,
            amount,
        });
        debug!(%pool, amount, total_supply = self.total_supply, "pool burn");
        Ok(())
    }

    /// Pay `amount` out of the liquidity pool to `to`, tax-free. Staking contract only.
    pub fn transfer_reward(&mut self, caller: Address, to: Address, amount: u128) -> Result<(), TokenError> {
        self.ensure_staking_contract(caller)?;
        let pool = self.uniswap_pool;
        let plan = self.plan_untaxed(pool, to, amount)?;
        self.apply(plan);
        debug!(%pool, %to, amount, "reward transfer");
        Ok(())
    }

    // ── Admin ───────────────────────────────────────────────────────────

    pub fn set_tax_enabled(&mut self, caller: Address, enabled: bool) -> Result<(), TokenError> {
        self.ensure_owner(caller)?;
        self.tax_enabled = enabled;
        self.events.record(LedgerEvent::TaxEnabledChanged { enabled });
        info!(enabled, "transfer tax toggled");
        Ok(())
    }

    pub fn set_staking_contract(&mut self, caller: Address, staking_contract: Address) -> Result<(), TokenError> {
        self.ensure_owner(caller)?;
        self.staking_contract = staking_contract;
        self.events
            .record(LedgerEvent::StakingContractChanged { staking_contract });
        info!(%staking_contract, "staking contract registered");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn is_tax_exempt(&self, from: &Address, to: &Address) -> bool {
        !self.tax_enabled || *from == self.staking_contract || *to == self.staking_contract
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized(caller));
        }
        Ok(())
    }

    fn ensure_staking_contract(&self, caller: Address) -> Result<(), TokenError> {
        if self.staking_contract.is_zero() || caller != self.staking_contract {
            return Err(TokenError::Unauthorized(caller));
        }
        Ok(())
    }

    fn plan_transfer(&self, from: Address, to: Address, amount: u128) -> Result<TransferPlan, TokenError> {
        let mut plan = self.plan_untaxed(from, to, amount)?;
        if !self.is_tax_exempt(&from, &to) {
            let tax = amount
                .checked_mul(self.transfer_tax_pct)
                .ok_or(TokenError::Overflow)?
                / 100;
            plan.net = amount - tax;
            plan.tax = tax;
        }
        Ok(plan)
    }

    fn plan_untaxed(&self, from: Address, to: Address, amount: u128) -> Result<TransferPlan, TokenError> {
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        let available = self.balance_of(&from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if from != to {
            self.balance_of(&to)
                .checked_add(amount)
                .ok_or(TokenError::Overflow)?;
        }
        Ok(TransferPlan {
            from,
            to,
            gross: amount,
            net: amount,
            tax: 0,
        })
    }

    /// Commit a plan. Every check already happened in `plan_*`.
    fn apply(&mut self, plan: TransferPlan) {
        let from_balance = self.balance_of(&plan.from) - plan.gross;
        self.balances.insert(plan.from, from_balance);
        let to_balance = self.balance_of(&plan.to) + plan.net;
        self.balances.insert(plan.to, to_balance);
        if plan.tax > 0 {
            self.total_supply -= plan.tax;
            self.events.record(LedgerEvent::Transferred {
                from: plan.from,
                to: Address::ZERO,
                amount: plan.tax,
            });
        }
        self.events.record(LedgerEvent::Transferred {
            from: plan.from,
            to: plan.to,
            amount: plan.net,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tws_types::TOKEN_UNIT;

    fn tokens(n: u128) -> u128 {
        n * TOKEN_UNIT
    }

    fn admin() -> Address {
        Address::from_low_u64(1)
    }

    fn alice() -> Address {
        Address::from_low_u64(2)
    }

    fn bob() -> Address {
        Address::from_low_u64(3)
    }

    fn pool() -> Address {
        Address::from_low_u64(0xfeed)
    }

    const SUPPLY: u128 = 10_000_000 * TOKEN_UNIT;

    fn make_ledger() -> TokenLedger {
        TokenLedger::new(admin(), SUPPLY, pool())
    }

    fn assert_supply_consistent(ledger: &TokenLedger) {
        assert_eq!(ledger.balances_total(), Some(ledger.total_supply()));
    }

    // --- Constructor ---

    #[test]
    fn constructor_assigns_initial_balance() {
        let ledger = make_ledger();
        assert_eq!(ledger.balance_of(&admin()), SUPPLY);
        assert_eq!(ledger.total_supply(), SUPPLY);
        assert_eq!(ledger.uniswap_pool(), pool());
        assert_eq!(ledger.owner(), admin());
    }

    #[test]
    fn constructor_leaves_tax_disabled() {
        let ledger = make_ledger();
        assert!(!ledger.tax_enabled());
        assert!(ledger.staking_contract().is_zero());
    }

    // --- Transfer ---

    #[test]
    fn cannot_transfer_from_empty_account() {
        let mut ledger = make_ledger();
        let result = ledger.transfer(alice(), alice(), 1);
        assert_eq!(
            result,
            Err(TokenError::InsufficientBalance {
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn cannot_transfer_above_supply() {
        let mut ledger = make_ledger();
        let result = ledger.transfer(admin(), alice(), SUPPLY + 10_000);
        assert!(matches!(result, Err(TokenError::InsufficientBalance { .. })));
        assert_eq!(ledger.balance_of(&admin()), SUPPLY);
    }

    #[test]
    fn cannot_transfer_to_zero_address() {
        let mut ledger = make_ledger();
        assert_eq!(
            ledger.transfer(admin(), Address::ZERO, 1),
            Err(TokenError::InvalidRecipient)
        );
    }

    #[test]
    fn transfer_records_event() {
        let mut ledger = make_ledger();
        ledger.transfer(admin(), alice(), 7).unwrap();
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: admin(),
                to: alice(),
                amount: 7
            })
        );
    }

    #[test]
    fn untaxed_transfer_moves_full_amount() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        let net = ledger.transfer(admin(), alice(), amt).unwrap();
        assert_eq!(net, amt);
        assert_eq!(ledger.balance_of(&alice()), amt);
        assert_eq!(ledger.balance_of(&admin()), SUPPLY - amt);
        assert_eq!(ledger.total_supply(), SUPPLY);
    }

    #[test]
    fn taxed_transfer_credits_amount_minus_tax() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        let tax = amt / 100;
        ledger.set_tax_enabled(admin(), true).unwrap();
        ledger.transfer(admin(), alice(), amt).unwrap();

        assert_eq!(ledger.balance_of(&alice()), amt - tax);
        assert_eq!(ledger.balance_of(&admin()), SUPPLY - amt);
        assert_eq!(ledger.total_supply(), SUPPLY - tax);
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: admin(),
                to: alice(),
                amount: amt - tax
            })
        );
        assert!(ledger.events().contains(&LedgerEvent::Transferred {
            from: admin(),
            to: Address::ZERO,
            amount: tax
        }));
        assert_supply_consistent(&ledger);
    }

    #[test]
    fn tax_truncates_small_amounts() {
        let mut ledger = make_ledger();
        ledger.set_tax_enabled(admin(), true).unwrap();
        assert_eq!(ledger.transfer(admin(), alice(), 99).unwrap(), 99);
        assert_eq!(ledger.transfer(admin(), alice(), 250).unwrap(), 248);
    }

    #[test]
    fn transfer_from_credits_amount_minus_tax_and_charges_full_allowance() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        ledger.transfer(admin(), alice(), amt).unwrap();
        ledger.approve(alice(), admin(), tokens(7000));
        ledger.set_tax_enabled(admin(), true).unwrap();

        let tax = amt / 100;
        let net = ledger.transfer_from(admin(), alice(), admin(), amt).unwrap();
        assert_eq!(net, amt - tax);
        assert_eq!(ledger.allowance(&alice(), &admin()), 0);
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: alice(),
                to: admin(),
                amount: amt - tax
            })
        );
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let mut ledger = make_ledger();
        ledger.approve(admin(), alice(), 10);
        let result = ledger.transfer_from(alice(), admin(), bob(), 11);
        assert_eq!(
            result,
            Err(TokenError::InsufficientAllowance {
                needed: 11,
                available: 10
            })
        );
        assert_eq!(ledger.allowance(&admin(), &alice()), 10);
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn approve_overwrites_previous_allowance() {
        let mut ledger = make_ledger();
        ledger.approve(admin(), alice(), 100);
        ledger.approve(admin(), alice(), 40);
        assert_eq!(ledger.allowance(&admin(), &alice()), 40);
    }

    #[test]
    fn no_tax_when_sent_to_staking_contract() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        ledger.set_tax_enabled(admin(), true).unwrap();
        ledger.set_staking_contract(admin(), alice()).unwrap();
        ledger.transfer(admin(), alice(), amt).unwrap();
        assert_eq!(ledger.balance_of(&alice()), amt);
        assert_eq!(ledger.total_supply(), SUPPLY);
    }

    #[test]
    fn no_tax_when_sent_from_staking_contract() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        ledger.transfer(admin(), alice(), amt).unwrap();
        ledger.set_tax_enabled(admin(), true).unwrap();
        ledger.set_staking_contract(admin(), alice()).unwrap();
        ledger.transfer(alice(), bob(), amt).unwrap();
        assert_eq!(ledger.balance_of(&bob()), amt);
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: alice(),
                to: bob(),
                amount: amt
            })
        );
    }

    #[test]
    fn transfer_from_no_tax_when_sent_to_staking_contract() {
        let mut ledger = make_ledger();
        let amt = tokens(7000);
        ledger.set_tax_enabled(admin(), true).unwrap();
        ledger.set_staking_contract(admin(), bob()).unwrap();
        ledger.approve(admin(), alice(), SUPPLY);
        ledger.transfer_from(alice(), admin(), bob(), amt).unwrap();
        assert_eq!(ledger.balance_of(&bob()), amt);
    }

    // --- Staking-contract primitives ---

    #[test]
    fn only_owner_sets_staking_contract() {
        let mut ledger = make_ledger();
        ledger.set_staking_contract(admin(), alice()).unwrap();
        assert_eq!(ledger.staking_contract(), alice());
        assert_eq!(
            ledger.set_staking_contract(alice(), bob()),
            Err(TokenError::Unauthorized(alice()))
        );
        assert_eq!(
            ledger.set_tax_enabled(bob(), true),
            Err(TokenError::Unauthorized(bob()))
        );
    }

    #[test]
    fn burn_fails_if_not_staking_contract() {
        let mut ledger = make_ledger();
        assert_eq!(
            ledger.burn(admin(), tokens(10)),
            Err(TokenError::Unauthorized(admin()))
        );
    }

    #[test]
    fn burn_takes_from_pool() {
        let mut ledger = make_ledger();
        ledger.set_staking_contract(admin(), admin()).unwrap();
        ledger.transfer(admin(), pool(), tokens(10)).unwrap();
        ledger.burn(admin(), tokens(10)).unwrap();

        assert_eq!(ledger.balance_of(&pool()), 0);
        assert_eq!(ledger.total_supply(), SUPPLY - tokens(10));
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: pool(),
                to: Address::ZERO,
                amount: tokens(10)
            })
        );
        assert_supply_consistent(&ledger);
    }

    #[test]
    fn burn_is_limited_by_pool_balance() {
        let mut ledger = make_ledger();
        ledger.set_staking_contract(admin(), admin()).unwrap();
        ledger.transfer(admin(), pool(), 5).unwrap();
        assert_eq!(
            ledger.burn(admin(), 6),
            Err(TokenError::InsufficientBalance {
                needed: 6,
                available: 5
            })
        );
        assert_eq!(ledger.total_supply(), SUPPLY);
    }

    #[test]
    fn transfer_reward_fails_if_not_staking_contract() {
        let mut ledger = make_ledger();
        assert_eq!(
            ledger.transfer_reward(admin(), alice(), tokens(10)),
            Err(TokenError::Unauthorized(admin()))
        );
    }

    #[test]
    fn transfer_reward_pays_from_pool_without_tax() {
        let mut ledger = make_ledger();
        ledger.set_staking_contract(admin(), admin()).unwrap();
        ledger.transfer(admin(), pool(), tokens(10)).unwrap();
        ledger.set_tax_enabled(admin(), true).unwrap();
        ledger.transfer_reward(admin(), alice(), tokens(10)).unwrap();

        assert_eq!(ledger.balance_of(&alice()), tokens(10));
        assert_eq!(
            ledger.events().last(),
            Some(&LedgerEvent::Transferred {
                from: pool(),
                to: alice(),
                amount: tokens(10)
            })
        );
    }

    #[test]
    fn take_events_drains() {
        let mut ledger = make_ledger();
        ledger.transfer(admin(), alice(), 1).unwrap();
        let events = ledger.take_events();
        assert_eq!(events.len(), 2); // mint + transfer
        assert!(ledger.events().is_empty());
    }
}
