//! Token amount type.
//!
//! Amounts are fixed-point integers (u128) with 18 implied decimals to avoid
//! floating-point errors. The smallest unit is 1 raw; one whole token is
//! [`TOKEN_UNIT`] raw.

use crate::error::TypesError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Raw units per whole token (10^18).
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// A TWS amount in raw units.
///
/// Serialized as a decimal string so it survives formats without 128-bit
/// integers (TOML, JSON consumers).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Whole tokens expanded to raw units (`tokens × 10^18`).
    ///
    /// Returns `None` if the result does not fit in 128 bits.
    pub fn checked_from_tokens(tokens: u128) -> Option<Self> {
        tokens.checked_mul(TOKEN_UNIT).map(Self)
    }

    /// Whole tokens expanded to raw units. Saturates at `u128::MAX`.
    pub fn from_tokens(tokens: u128) -> Self {
        Self(tokens.saturating_mul(TOKEN_UNIT))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Whole tokens, truncating the fractional part.
    pub fn whole_tokens(&self) -> u128 {
        self.0 / TOKEN_UNIT
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Add for TokenAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TokenAmount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl From<u128> for TokenAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / TOKEN_UNIT;
        let frac = self.0 % TOKEN_UNIT;
        if frac == 0 {
            write!(f, "{whole} TWS")
        } else {
            let digits = format!("{frac:018}");
            write!(f, "{whole}.{} TWS", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for TokenAmount {
    type Err = TypesError;

    /// Parses a raw decimal integer, or whole tokens with a `tokens` suffix
    /// (e.g. `"1000 tokens"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(tokens) = trimmed.strip_suffix("tokens") {
            let tokens: u128 = tokens
                .trim()
                .parse()
                .map_err(|_| TypesError::InvalidAmount(s.to_string()))?;
            return Self::checked_from_tokens(tokens)
                .ok_or_else(|| TypesError::InvalidAmount(format!("{s}: overflow")));
        }
        trimmed
            .parse::<u128>()
            .map(Self)
            .map_err(|_| TypesError::InvalidAmount(s.to_string()))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
