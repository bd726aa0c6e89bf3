//! Fundamental types for the TWS ledger.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! addresses, raw token amounts, timestamps and clocks, economic parameters,
//! and the event records produced by the token ledger and staking engine.

pub mod address;
pub mod amount;
pub mod error;
pub mod event;
pub mod params;
pub mod time;

pub use address::Address;
pub use amount::{TokenAmount, TOKEN_UNIT};
pub use error::TypesError;
pub use event::{EventLog, LedgerEvent};
pub use params::EconomicParams;
pub use time::{Clock, SystemClock, Timestamp};
