//! Static token tables used to resolve symbols into addresses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Address, IntentError, NetworkId, Result, TokenInfo};

/// Metadata of a well-known token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal precision.
    pub decimals: u32,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl TokenMeta {
    /// Create new token metadata.
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            name: None,
        }
    }
}

/// Tokens of one network, keyed by address.
pub type TokenDirectory = HashMap<Address, TokenMeta>;

/// Read-only lookup of well-known tokens per network.
pub trait TokenTable: Send + Sync {
    /// Get the directory for a network.
    fn lookup(&self, network: &NetworkId) -> Option<&TokenDirectory>;

    /// Resolve a symbol (case-insensitively) into a token.
    ///
    /// If several addresses share a symbol the lexicographically smallest
    /// address wins, so resolution is deterministic.
    fn resolve_symbol(&self, network: &NetworkId, symbol: &str) -> Option<TokenInfo> {
        self.lookup(network)?
            .iter()
            .filter(|(_, meta)| meta.symbol.eq_ignore_ascii_case(symbol))
            .min_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()))
            .map(|(address, meta)| TokenInfo::new(address.clone(), meta.decimals, meta.symbol.clone()))
    }
}

/// In-memory token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenTable {
    networks: HashMap<NetworkId, TokenDirectory>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    address: String,
    symbol: String,
    decimals: u32,
    #[serde(default)]
    name: Option<String>,
}

impl StaticTokenTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token.
    pub fn insert(&mut self, network: NetworkId, address: Address, meta: TokenMeta) {
        self.networks.entry(network).or_default().insert(address, meta);
    }

    /// Add a token, builder style.
    pub fn with_token(
        mut self,
        network: NetworkId,
        address: &str,
        symbol: &str,
        decimals: u32,
    ) -> Self {
        self.insert(network, Address::new(address), TokenMeta::new(symbol, decimals));
        self
    }

    /// Load a table from JSON of the form
    /// `{"bnb": [{"address": "0x..", "symbol": "BINK", "decimals": 18}]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<TokenEntry>> = serde_json::from_str(json)
            .map_err(|e| IntentError::Configuration(format!("token table: {}", e)))?;

        let mut table = Self::new();
        for (network, entries) in raw {
            let network = NetworkId::new(network);
            for entry in entries {
                let meta = TokenMeta {
                    symbol: entry.symbol,
                    decimals: entry.decimals,
                    name: entry.name,
                };
                table.insert(network.clone(), Address::new(entry.address), meta);
            }
        }
        Ok(table)
    }

    /// Built-in table of well-known tokens.
    pub fn builtin() -> Self {
        Self::new()
            .with_token(NetworkId::bnb(), "0x5fdfaFd107Fc267bD6d6B1C08fcafb8d31394ba1", "BINK", 18)
            .with_token(NetworkId::bnb(), "0x55d398326f99059fF775485246999027B3197955", "USDT", 18)
            .with_token(NetworkId::bnb(), "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", "USDC", 18)
            .with_token(NetworkId::bnb(), "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82", "CAKE", 18)
            .with_token(NetworkId::bnb(), "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c", "WBNB", 18)
            .with_token(NetworkId::ethereum(), "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6)
            .with_token(NetworkId::ethereum(), "0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT", 6)
            .with_token(NetworkId::ethereum(), "0x6B175474E89094C44Da98b954EedeAC495271d0F", "DAI", 18)
            .with_token(NetworkId::ethereum(), "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "WETH", 18)
            .with_token(NetworkId::base(), "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USDC", 6)
            .with_token(NetworkId::base(), "0x4200000000000000000000000000000000000006", "WETH", 18)
            .with_token(NetworkId::solana(), "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6)
            .with_token(NetworkId::solana(), "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", 6)
            .with_token(NetworkId::solana(), "So11111111111111111111111111111111111111112", "WSOL", 9)
    }
}

impl TokenTable for StaticTokenTable {
    fn lookup(&self, network: &NetworkId) -> Option<&TokenDirectory> {
        self.networks.get(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_symbol_case_insensitive() {
        let table = StaticTokenTable::builtin();
        let token = table.resolve_symbol(&NetworkId::bnb(), "bink").unwrap();

        assert_eq!(token.symbol, "BINK");
        assert_eq!(
            token.address,
            Address::new("0x5fdfafd107fc267bd6d6b1c08fcafb8d31394ba1")
        );
    }

    #[test]
    fn test_resolve_unknown_symbol() {
        let table = StaticTokenTable::builtin();
        assert!(table.resolve_symbol(&NetworkId::bnb(), "NOPE").is_none());
        assert!(table.resolve_symbol(&NetworkId::new("dogechain"), "BINK").is_none());
    }

    #[test]
    fn test_symbols_are_per_network() {
        let table = StaticTokenTable::builtin();
        let bnb = table.resolve_symbol(&NetworkId::bnb(), "USDC").unwrap();
        let eth = table.resolve_symbol(&NetworkId::ethereum(), "USDC").unwrap();

        assert_ne!(bnb.address, eth.address);
        assert_eq!(eth.decimals, 6);
    }

    #[test]
    fn test_duplicate_symbol_resolution_is_deterministic() {
        let table = StaticTokenTable::new()
            .with_token(NetworkId::bnb(), "0x00000000000000000000000000000000000000bb", "DUP", 18)
            .with_token(NetworkId::bnb(), "0x00000000000000000000000000000000000000aa", "DUP", 18);

        for _ in 0..10 {
            let token = table.resolve_symbol(&NetworkId::bnb(), "dup").unwrap();
            assert_eq!(token.address.as_str(), "0x00000000000000000000000000000000000000aa");
        }
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"BNB": [{"address": "0x5fdfaFd107Fc267bD6d6B1C08fcafb8d31394ba1", "symbol": "BINK", "decimals": 18}]}"#;
        let table = StaticTokenTable::from_json(json).unwrap();

        let directory = table.lookup(&NetworkId::bnb()).unwrap();
        assert_eq!(directory.len(), 1);
        assert!(StaticTokenTable::from_json("not json").is_err());
    }
}
