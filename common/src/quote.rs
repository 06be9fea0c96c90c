//! Quotes and transaction descriptors.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{to_base_units, Address, NetworkId, OperationParams, QuoteId, Result, TokenInfo};

/// A priced proposal returned by a provider, before it is issued.
#[derive(Debug, Clone)]
pub struct ProviderQuote {
    /// Token spent.
    pub from_token: TokenInfo,
    /// Token received.
    pub to_token: TokenInfo,
    /// Amount spent, in human units.
    pub from_amount: Decimal,
    /// Amount received, in human units.
    pub to_amount: Decimal,
    /// Estimated gas units.
    pub estimated_gas: Option<u64>,
    /// Price impact in percent.
    pub price_impact: Option<Decimal>,
    /// Provider specific validity override.
    pub ttl: Option<Duration>,
    /// Opaque provider route data, needed later to build the transaction.
    pub route: serde_json::Value,
}

impl ProviderQuote {
    /// Create a new provider quote.
    pub fn new(
        from_token: TokenInfo,
        to_token: TokenInfo,
        from_amount: Decimal,
        to_amount: Decimal,
    ) -> Self {
        Self {
            from_token,
            to_token,
            from_amount,
            to_amount,
            estimated_gas: None,
            price_impact: None,
            ttl: None,
            route: serde_json::Value::Null,
        }
    }

    /// Set the gas estimate.
    pub fn with_estimated_gas(mut self, gas: u64) -> Self {
        self.estimated_gas = Some(gas);
        self
    }

    /// Set the price impact.
    pub fn with_price_impact(mut self, impact: Decimal) -> Self {
        self.price_impact = Some(impact);
        self
    }

    /// Override the validity window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Attach provider route data.
    pub fn with_route(mut self, route: serde_json::Value) -> Self {
        self.route = route;
        self
    }
}

/// An issued, time-bound quote.
///
/// Quotes are never mutated after issuance; any parameter change needs a
/// new quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Unique quote ID.
    pub id: QuoteId,
    /// Name of the issuing provider.
    pub provider: String,
    /// Network the quote is valid on.
    pub network: NetworkId,
    /// Parameters the quote was requested with.
    pub params: OperationParams,
    /// Identity the quote was issued to.
    pub originator: Address,
    /// Token spent.
    pub from_token: TokenInfo,
    /// Token received.
    pub to_token: TokenInfo,
    /// Amount spent, in human units.
    pub from_amount: Decimal,
    /// Amount received, in human units.
    pub to_amount: Decimal,
    /// Estimated gas units.
    pub estimated_gas: Option<u64>,
    /// Price impact in percent.
    pub price_impact: Option<Decimal>,
    /// Opaque provider route data.
    pub route: serde_json::Value,
    /// When the quote was issued.
    pub issued_at: DateTime<Utc>,
    /// When the quote stops being consumable.
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Issue a quote from a provider proposal.
    pub fn issue(
        proposal: ProviderQuote,
        provider: impl Into<String>,
        params: OperationParams,
        originator: Address,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: QuoteId::new(),
            provider: provider.into(),
            network: params.network.clone(),
            params,
            originator,
            from_token: proposal.from_token,
            to_token: proposal.to_token,
            from_amount: proposal.from_amount,
            to_amount: proposal.to_amount,
            estimated_gas: proposal.estimated_gas,
            price_impact: proposal.price_impact,
            route: proposal.route,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Whether the quote is still consumable at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Amount of `from_token` that must be transferable, in base units.
    pub fn required_amount(&self) -> Result<u128> {
        to_base_units(self.from_amount, self.from_token.decimals)
    }

    /// Amount received, in base units.
    pub fn output_base_units(&self) -> Result<u128> {
        to_base_units(self.to_amount, self.to_token.decimals)
    }

    /// Derive a working copy whose source token is replaced.
    ///
    /// Used after a native asset has been wrapped. The cached quote is not
    /// touched.
    pub fn with_source_token(&self, token: TokenInfo) -> Self {
        let mut derived = self.clone();
        derived.from_token = token;
        derived
    }
}

/// An unsigned transaction produced by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDescriptor {
    /// Target contract or account.
    pub to: Address,
    /// Hex encoded call data (or serialized instructions).
    pub data: String,
    /// Native value attached, in base units.
    pub value: u128,
    /// Spender that must be authorized before sending, if any.
    pub spender: Option<Address>,
}

impl TxDescriptor {
    /// Create a new descriptor without a spender.
    pub fn new(to: Address, data: impl Into<String>, value: u128) -> Self {
        Self {
            to,
            data: data.into(),
            value,
            spender: None,
        }
    }

    /// Require authorization of `spender` before this transaction is sent.
    pub fn with_spender(mut self, spender: Address) -> Self {
        self.spender = Some(spender);
        self
    }
}

/// Result of a provider balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// Whether the balance covers the quote.
    pub is_valid: bool,
    /// Explanation when it does not.
    pub message: Option<String>,
}

impl BalanceCheck {
    /// A passing balance check.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    /// A failing balance check.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}
