//! Shared utilities for the TWS ledger.

pub mod logging;
pub mod time;

pub use logging::init_tracing;
pub use time::{format_duration, time_until_next_sanitise};
