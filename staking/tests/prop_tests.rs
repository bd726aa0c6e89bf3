use proptest::prelude::*;

use tws_staking::{token_time, StakingEngine};
use tws_token::TokenLedger;
use tws_types::{Address, Timestamp, TOKEN_UNIT};

const SUPPLY: u128 = 10_000_000 * TOKEN_UNIT;

fn owner() -> Address {
    Address::from_low_u64(1)
}

fn account(n: u8) -> Address {
    Address::from_low_u64(n as u64 + 10)
}

fn staking() -> Address {
    Address::from_low_u64(0x5747)
}

fn pool() -> Address {
    Address::from_low_u64(0x0f00)
}

fn at(secs: u64) -> Timestamp {
    Timestamp::new(1_000_000 + secs)
}

/// Ledger and engine wired together with five funded, approved accounts.
fn setup(tax: bool) -> (TokenLedger, StakingEngine) {
    let mut ledger = TokenLedger::new(owner(), SUPPLY, pool());
    let mut engine = StakingEngine::new(staking(), owner(), pool(), at(0));
    ledger.transfer(owner(), pool(), SUPPLY / 4).unwrap();
    ledger.set_staking_contract(owner(), staking()).unwrap();
    engine.set_allow_staking(owner(), true).unwrap();
    for n in 0..5 {
        ledger.transfer(owner(), account(n), 100_000 * TOKEN_UNIT).unwrap();
        ledger.approve(account(n), staking(), u128::MAX);
    }
    ledger.set_tax_enabled(owner(), tax).unwrap();
    (ledger, engine)
}

#[derive(Clone, Debug)]
enum Op {
    Stake(u8, u128),
    Unstake(u8),
    Claim(u8),
    Sanitise(u8),
    Accrue(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..5, 1u128..50_000 * TOKEN_UNIT).prop_map(|(n, a)| Op::Stake(n, a)),
        2 => (0u8..5).prop_map(Op::Unstake),
        2 => (0u8..5).prop_map(Op::Claim),
        1 => (0u8..5).prop_map(Op::Sanitise),
        1 => (0u8..5).prop_map(Op::Accrue),
    ]
}

fn run(engine: &mut StakingEngine, ledger: &mut TokenLedger, op: &Op, now: Timestamp) -> bool {
    match *op {
        Op::Stake(n, amount) => engine.stake(account(n), amount, ledger, now).is_ok(),
        Op::Unstake(n) => engine.unstake(account(n), ledger, now).is_ok(),
        Op::Claim(n) => engine.claim_reward(account(n), now).is_ok(),
        Op::Sanitise(n) => engine.sanitise_pool(account(n), ledger, now).is_ok(),
        Op::Accrue(n) => engine.accrue(&account(n), now).is_ok(),
    }
}

proptest! {
    /// Accrual over [a, c] equals accrual over [a, b] plus [b, c].
    #[test]
    fn token_time_is_additive(staked in any::<u128>(), d1 in 0u64..1_000_000, d2 in 0u64..1_000_000) {
        let whole = token_time(staked, d1 + d2);
        let split = token_time(staked, d1) + token_time(staked, d2);
        prop_assert_eq!(whole, split);
    }

    /// Accruing in several steps lands on the same figures as accruing once.
    #[test]
    fn accrue_steps_match_single_accrual(amount in 1u128..50_000 * TOKEN_UNIT, steps in prop::collection::vec(0u64..10_000, 1..10)) {
        let (mut ledger, mut stepped) = setup(false);
        stepped.stake(account(0), amount, &mut ledger, at(1)).unwrap();
        let mut once = stepped.clone();

        let mut now = 1;
        for step in &steps {
            now += step;
            stepped.accrue(&account(0), at(now)).unwrap();
        }
        once.accrue(&account(0), at(now)).unwrap();

        prop_assert_eq!(stepped.staker(&account(0)), once.staker(&account(0)));
        prop_assert_eq!(stepped.global(), once.global());
    }

    /// A second accrual at the same instant changes nothing.
    #[test]
    fn accrue_is_idempotent(amount in 1u128..50_000 * TOKEN_UNIT, elapsed in 0u64..100_000) {
        let (mut ledger, mut engine) = setup(true);
        engine.stake(account(0), amount, &mut ledger, at(1)).unwrap();
        engine.accrue(&account(0), at(1 + elapsed)).unwrap();
        let before = engine.clone();
        engine.accrue(&account(0), at(1 + elapsed)).unwrap();
        prop_assert_eq!(engine.staker(&account(0)), before.staker(&account(0)));
        prop_assert_eq!(engine.global(), before.global());
    }

    /// Unstaking pays back the stake minus 7% and moves the 7% to the reward pool.
    #[test]
    fn unstake_charges_exit_tax(amount in 1u128..100_000 * TOKEN_UNIT, tax in any::<bool>()) {
        let (mut ledger, mut engine) = setup(tax);
        let start = ledger.balance_of(&account(0));
        engine.stake(account(0), amount, &mut ledger, at(1)).unwrap();
        let payout = engine.unstake(account(0), &mut ledger, at(500)).unwrap();
        let exit_tax = amount * 7 / 100;
        prop_assert_eq!(payout, amount - exit_tax);
        prop_assert_eq!(ledger.balance_of(&account(0)), start - exit_tax);
        prop_assert_eq!(engine.reward_pool(), exit_tax);
        prop_assert_eq!(ledger.balance_of(&staking()), exit_tax);
    }

    /// After any sequence of operations, successful or not:
    /// the stakes sum to the global stake, projected token times sum to the
    /// projected global time, and the ledger still balances.
    #[test]
    fn aggregates_stay_consistent(
        tax in any::<bool>(),
        ops in prop::collection::vec((op(), 0u64..8_000), 1..40),
    ) {
        let (mut ledger, mut engine) = setup(tax);
        let mut now = 1;
        for (op, step) in &ops {
            now += step;
            run(&mut engine, &mut ledger, op, at(now));

            prop_assert_eq!(engine.staked_sum(), Some(engine.global().total_staked_tokens));
            prop_assert_eq!(
                engine.projected_token_time_sum(at(now)),
                engine.global().projected_token_time(at(now))
            );
            prop_assert_eq!(ledger.balances_total(), Some(ledger.total_supply()));
            prop_assert!(ledger.balance_of(&staking()) >= engine.global().total_staked_tokens + engine.reward_pool());
        }
    }

    /// A rejected operation leaves the engine and ledger untouched.
    #[test]
    fn failed_ops_mutate_nothing(
        ops in prop::collection::vec((op(), 0u64..8_000), 1..30),
    ) {
        let (mut ledger, mut engine) = setup(true);
        let mut now = 1;
        for (op, step) in &ops {
            now += step;
            let engine_before = engine.clone();
            let ledger_before = ledger.clone();
            if !run(&mut engine, &mut ledger, op, at(now)) {
                prop_assert_eq!(engine.global(), engine_before.global());
                prop_assert_eq!(&engine.stakers, &engine_before.stakers);
                prop_assert_eq!(ledger.total_supply(), ledger_before.total_supply());
                for n in 0..5 {
                    prop_assert_eq!(ledger.balance_of(&account(n)), ledger_before.balance_of(&account(n)));
                }
                prop_assert_eq!(ledger.balance_of(&staking()), ledger_before.balance_of(&staking()));
                prop_assert_eq!(ledger.balance_of(&pool()), ledger_before.balance_of(&pool()));
            }
        }
    }
}
