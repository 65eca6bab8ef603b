//! Token registry consumed by the rate engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry entry for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token symbol
    pub symbol: String,
    /// Number of decimals of the token's smallest unit
    pub decimals: u8,
    /// Chain native coin (ETH)
    pub is_native_coin: bool,
}

impl TokenInfo {
    /// Create a regular ERC-20 style token entry
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            is_native_coin: false,
        }
    }

    /// Create the native coin entry
    pub fn native(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            is_native_coin: true,
            ..Self::new(symbol, decimals)
        }
    }
}

/// Lookup of token metadata by symbol
pub trait TokenRegistry: Send + Sync {
    /// Returns the token registered under `symbol`
    fn token_by_symbol(&self, symbol: &str) -> Option<TokenInfo>;
}

/// Registry backed by a fixed token list
#[derive(Debug, Clone, Default)]
pub struct StaticTokenRegistry {
    tokens: HashMap<String, TokenInfo>,
}

impl StaticTokenRegistry {
    pub fn new(tokens: impl IntoIterator<Item = TokenInfo>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|token| (token.symbol.clone(), token))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenRegistry for StaticTokenRegistry {
    fn token_by_symbol(&self, symbol: &str) -> Option<TokenInfo> {
        self.tokens.get(symbol).cloned()
    }
}
