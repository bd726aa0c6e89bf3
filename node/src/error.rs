use thiserror::Error;

use tws_staking::StakingError;
use tws_token::TokenError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("staking error: {0}")]
    Staking(#[from] StakingError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("node state lock poisoned")]
    Poisoned,
}

impl From<bincode::Error> for NodeError {
    fn from(e: bincode::Error) -> Self {
        NodeError::Serialization(e.to_string())
    }
}
