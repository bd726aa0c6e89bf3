//! Prometheus metrics for the TWS node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]. Counters are labelled by
//! operation name; gauges mirror the ledger and engine after every operation.

use prometheus::{
    register_gauge_with_registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, register_int_gauge_with_registry, Encoder, Gauge,
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tws_types::TOKEN_UNIT;

/// Point-in-time figures pushed into the gauges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GaugeReadings {
    pub total_supply: u128,
    pub pool_balance: u128,
    pub total_staked: u128,
    pub reward_pool: u128,
    pub stakers: usize,
    pub burn_id: u64,
}

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Operations applied, by operation name.
    pub ops_applied: IntCounterVec,
    /// Operations rejected with an error, by operation name.
    pub ops_rejected: IntCounterVec,

    // ── Gauges (whole tokens) ───────────────────────────────────────────
    pub total_supply: Gauge,
    pub pool_balance: Gauge,
    pub total_staked: Gauge,
    pub reward_pool: Gauge,
    pub staker_count: IntGauge,
    pub burn_id: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent holding the state lock, in microseconds.
    pub op_duration_us: HistogramVec,
}

fn whole_tokens(raw: u128) -> f64 {
    raw as f64 / TOKEN_UNIT as f64
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ops_applied = register_int_counter_vec_with_registry!(
            Opts::new("tws_ops_applied_total", "Operations applied by the node"),
            &["op"],
            registry
        )?;
        let ops_rejected = register_int_counter_vec_with_registry!(
            Opts::new("tws_ops_rejected_total", "Operations rejected by the node"),
            &["op"],
            registry
        )?;

        let total_supply = register_gauge_with_registry!(
            Opts::new("tws_total_supply_tokens", "Total token supply"),
            registry
        )?;
        let pool_balance = register_gauge_with_registry!(
            Opts::new("tws_pool_balance_tokens", "Liquidity pool balance"),
            registry
        )?;
        let total_staked = register_gauge_with_registry!(
            Opts::new("tws_staked_tokens", "Tokens staked across all stakers"),
            registry
        )?;
        let reward_pool = register_gauge_with_registry!(
            Opts::new("tws_reward_pool_tokens", "Undistributed staking rewards"),
            registry
        )?;
        let staker_count = register_int_gauge_with_registry!(
            Opts::new("tws_stakers", "Accounts with a non-zero stake"),
            registry
        )?;
        let burn_id = register_int_gauge_with_registry!(
            Opts::new("tws_burn_id", "Number of pool sanitisations so far"),
            registry
        )?;

        let op_duration_us = register_histogram_vec_with_registry!(
            HistogramOpts::new("tws_op_duration_us", "Operation time under the state lock")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            &["op"],
            registry
        )?;

        Ok(Self {
            registry,
            ops_applied,
            ops_rejected,
            total_supply,
            pool_balance,
            total_staked,
            reward_pool,
            staker_count,
            burn_id,
            op_duration_us,
        })
    }

    pub fn observe(&self, op: &str, applied: bool, micros: f64) {
        let counter = if applied {
            &self.ops_applied
        } else {
            &self.ops_rejected
        };
        counter.with_label_values(&[op]).inc();
        self.op_duration_us.with_label_values(&[op]).observe(micros);
    }

    pub fn set_gauges(&self, readings: &GaugeReadings) {
        self.total_supply.set(whole_tokens(readings.total_supply));
        self.pool_balance.set(whole_tokens(readings.pool_balance));
        self.total_staked.set(whole_tokens(readings.total_staked));
        self.reward_pool.set(whole_tokens(readings.reward_pool));
        self.staker_count.set(readings.stakers as i64);
        self.burn_id.set(readings.burn_id as i64);
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
