//! Token references and resolved token metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, ChainFamily};

/// A caller supplied token reference.
///
/// This is whatever the caller typed: usually an address, sometimes a
/// symbol such as `BINK`. Providers resolve it; the recovery path may
/// rewrite a symbol into an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef(String);

impl TokenRef {
    /// Create a new token reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into().trim().to_string())
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is a well-formed address for the chain family.
    pub fn is_address_for(&self, family: ChainFamily) -> bool {
        family.is_valid_address(&self.0)
    }

    /// Interpret the reference as an address.
    pub fn to_address(&self) -> Address {
        Address::new(self.0.clone())
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&Address> for TokenRef {
    fn from(address: &Address) -> Self {
        Self::new(address.as_str())
    }
}

/// Which side of an operation a token reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSide {
    From,
    To,
}

impl fmt::Display for TokenSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSide::From => write!(f, "from"),
            TokenSide::To => write!(f, "to"),
        }
    }
}

/// A resolved token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Contract or mint address.
    pub address: Address,
    /// Decimal precision of base units.
    pub decimals: u32,
    /// Ticker symbol.
    pub symbol: String,
}

impl TokenInfo {
    /// Create new token info.
    pub fn new(address: Address, decimals: u32, symbol: impl Into<String>) -> Self {
        Self {
            address,
            decimals,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}
