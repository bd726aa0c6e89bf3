//! TWS node: hosts the token ledger and the staking engine.
//!
//! The node is the single writer in front of the core:
//! - Deploys the ledger and engine from a [`NodeConfig`]
//! - Serializes every operation through one lock, reading `now` from a clock
//! - Fans recorded events out to [`EventBus`] subscribers
//! - Keeps Prometheus gauges in step with supply, stake and reward pool
//! - Snapshots and restores the full state

pub mod command;
pub mod config;
pub mod error;
pub mod ledger_event;
pub mod logging;
pub mod metrics;
pub mod node;

pub use command::{Command, Outcome};
pub use config::NodeConfig;
pub use error::NodeError;
pub use ledger_event::EventBus;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{NodeSummary, TwsNode};
