//! Network identifiers and the catalog of supported chains.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, IntentError, Result, TokenInfo};

/// Identifier of a blockchain network (e.g. `bnb`, `ethereum`, `solana`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(String);

impl NetworkId {
    /// Create a new network ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_lowercase())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up the catalog entry for this network.
    pub fn spec(&self) -> Option<&'static NetworkSpec> {
        NETWORKS.iter().find(|spec| spec.id == self.0)
    }

    /// Look up the catalog entry, failing for unknown networks.
    pub fn require_spec(&self) -> Result<&'static NetworkSpec> {
        self.spec()
            .ok_or_else(|| IntentError::NetworkNotSupported(self.clone()))
    }

    /// Common networks
    pub fn ethereum() -> Self {
        Self::new("ethereum")
    }

    pub fn bnb() -> Self {
        Self::new("bnb")
    }

    pub fn base() -> Self {
        Self::new("base")
    }

    pub fn solana() -> Self {
        Self::new("solana")
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Address and transaction model family of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Account based chains with ERC-20 style allowances.
    Evm,
    /// Solana; token programs have no spender allowance step.
    Solana,
}

impl ChainFamily {
    /// Check whether `s` is a well-formed address for this family.
    pub fn is_valid_address(&self, s: &str) -> bool {
        match self {
            ChainFamily::Evm => {
                s.len() == 42
                    && (s.starts_with("0x") || s.starts_with("0X"))
                    && s[2..].chars().all(|c| c.is_ascii_hexdigit())
            }
            ChainFamily::Solana => {
                (32..=44).contains(&s.len())
                    && s.chars().all(|c| BASE58_ALPHABET.contains(c))
            }
        }
    }
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const EVM_NATIVE_SENTINEL: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Static description of a supported network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Catalog identifier.
    pub id: &'static str,
    /// Chain family.
    pub family: ChainFamily,
    /// EVM chain id, if any.
    pub chain_id: Option<u64>,
    /// Symbol of the native asset.
    pub native_symbol: &'static str,
    /// Sentinel address used to reference the native asset.
    pub native_address: &'static str,
    /// Decimals of the native asset.
    pub native_decimals: u32,
    /// Symbol of the wrapped native token.
    pub wrapped_symbol: &'static str,
    /// Address of the wrapped native token.
    pub wrapped_address: &'static str,
}

impl NetworkSpec {
    /// Get the network ID.
    pub fn network_id(&self) -> NetworkId {
        NetworkId::new(self.id)
    }

    /// Whether token transfers by a third party require a prior approval.
    pub fn supports_allowance(&self) -> bool {
        matches!(self.family, ChainFamily::Evm)
    }

    /// Whether the address refers to the chain's native asset.
    pub fn is_native(&self, address: &Address) -> bool {
        *address == Address::new(self.native_address)
    }

    /// The wrapped form of the native asset.
    pub fn wrapped_native_token(&self) -> TokenInfo {
        TokenInfo::new(
            Address::new(self.wrapped_address),
            self.native_decimals,
            self.wrapped_symbol,
        )
    }
}

/// Known networks.
pub static NETWORKS: &[NetworkSpec] = &[
    NetworkSpec {
        id: "ethereum",
        family: ChainFamily::Evm,
        chain_id: Some(1),
        native_symbol: "ETH",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WETH",
        wrapped_address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
    },
    NetworkSpec {
        id: "bnb",
        family: ChainFamily::Evm,
        chain_id: Some(56),
        native_symbol: "BNB",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WBNB",
        wrapped_address: "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c",
    },
    NetworkSpec {
        id: "base",
        family: ChainFamily::Evm,
        chain_id: Some(8453),
        native_symbol: "ETH",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WETH",
        wrapped_address: "0x4200000000000000000000000000000000000006",
    },
    NetworkSpec {
        id: "arbitrum",
        family: ChainFamily::Evm,
        chain_id: Some(42161),
        native_symbol: "ETH",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WETH",
        wrapped_address: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
    },
    NetworkSpec {
        id: "optimism",
        family: ChainFamily::Evm,
        chain_id: Some(10),
        native_symbol: "ETH",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WETH",
        wrapped_address: "0x4200000000000000000000000000000000000006",
    },
    NetworkSpec {
        id: "polygon",
        family: ChainFamily::Evm,
        chain_id: Some(137),
        native_symbol: "POL",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WPOL",
        wrapped_address: "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
    },
    NetworkSpec {
        id: "avalanche",
        family: ChainFamily::Evm,
        chain_id: Some(43114),
        native_symbol: "AVAX",
        native_address: EVM_NATIVE_SENTINEL,
        native_decimals: 18,
        wrapped_symbol: "WAVAX",
        wrapped_address: "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7",
    },
    NetworkSpec {
        id: "solana",
        family: ChainFamily::Solana,
        chain_id: None,
        native_symbol: "SOL",
        native_address: "So11111111111111111111111111111111111111111",
        native_decimals: 9,
        wrapped_symbol: "WSOL",
        wrapped_address: "So11111111111111111111111111111111111111112",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_id_normalized() {
        assert_eq!(NetworkId::new(" BNB "), NetworkId::bnb());
    }

    #[test]
    fn test_unknown_network() {
        let result = NetworkId::new("dogechain").require_spec();
        assert!(matches!(result, Err(IntentError::NetworkNotSupported(_))));
    }

    #[test]
    fn test_allowance_model() {
        assert!(NetworkId::bnb().spec().unwrap().supports_allowance());
        assert!(!NetworkId::solana().spec().unwrap().supports_allowance());
    }

    #[test]
    fn test_address_validation() {
        assert!(ChainFamily::Evm.is_valid_address("0x5fdfafd107fc267bd6d6b1c08fcafb8d31394ba1"));
        assert!(!ChainFamily::Evm.is_valid_address("BINK"));
        assert!(!ChainFamily::Evm.is_valid_address("0x5fdf"));
        assert!(ChainFamily::Solana.is_valid_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        // '0' and 'O' are not in the base58 alphabet
        assert!(!ChainFamily::Solana.is_valid_address("0OjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
    }

    #[test]
    fn test_native_detection() {
        let bnb = NetworkId::bnb().require_spec().unwrap();
        assert!(bnb.is_native(&Address::new("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE")));
        assert_eq!(bnb.wrapped_native_token().symbol, "WBNB");
    }
}
