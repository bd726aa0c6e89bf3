//! Token ledger errors.

use thiserror::Error;
use tws_types::Address;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, approved {available}")]
    InsufficientAllowance { needed: u128, available: u128 },

    #[error("recipient is the zero address")]
    InvalidRecipient,

    #[error("caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("arithmetic overflow in ledger computation")]
    Overflow,
}
