//! TWS token ledger.
//!
//! An ERC20-style balance sheet with one twist: when tax is enabled, every
//! transfer that does not touch the staking contract destroys 1% of the
//! transferred amount. The staking contract is also the only caller allowed
//! to burn from, or pay rewards out of, the designated liquidity pool.

pub mod error;
pub mod ledger;

pub use error::TokenError;
pub use ledger::TokenLedger;
