//! Operation parameters submitted by callers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{parse_amount, NetworkId, Result, TokenRef, TokenSide};

/// Kind of on-chain operation being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Exchange one token for another on the same network.
    Swap,
    /// Deposit a token into a staking venue.
    Stake,
    /// Move a token to another network.
    Bridge,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Swap => write!(f, "swap"),
            OperationKind::Stake => write!(f, "stake"),
            OperationKind::Bridge => write!(f, "bridge"),
        }
    }
}

/// Which side of the trade the caller fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountType {
    /// `amount` is what the caller spends; maximize what is received.
    Input,
    /// `amount` is what the caller wants to receive; minimize what is spent.
    Output,
}

/// Parameters of one requested operation.
///
/// Immutable once submitted: a change (such as a corrected token reference)
/// produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationParams {
    /// Operation kind.
    pub kind: OperationKind,
    /// Network the operation starts on.
    pub network: NetworkId,
    /// Destination network for bridges.
    pub destination_network: Option<NetworkId>,
    /// Token being spent.
    pub from_token: TokenRef,
    /// Token being received.
    pub to_token: TokenRef,
    /// Amount, interpreted according to `amount_type`.
    pub amount: Decimal,
    /// Which side `amount` fixes.
    pub amount_type: AmountType,
    /// Maximum tolerated slippage in percent.
    pub slippage: Decimal,
    /// Optional limit price (turns a swap into a limit order).
    pub limit_price: Option<Decimal>,
}

impl OperationParams {
    /// Default slippage tolerance in percent.
    pub const DEFAULT_SLIPPAGE: Decimal = Decimal::ONE;

    /// Create new operation parameters from a caller supplied amount string.
    pub fn new(
        kind: OperationKind,
        network: NetworkId,
        from_token: impl Into<TokenRef>,
        to_token: impl Into<TokenRef>,
        amount: &str,
        amount_type: AmountType,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            network,
            destination_network: None,
            from_token: from_token.into(),
            to_token: to_token.into(),
            amount: parse_amount(amount)?,
            amount_type,
            slippage: Self::DEFAULT_SLIPPAGE,
            limit_price: None,
        })
    }

    /// Create swap parameters.
    pub fn swap(
        network: NetworkId,
        from_token: impl Into<TokenRef>,
        to_token: impl Into<TokenRef>,
        amount: &str,
        amount_type: AmountType,
    ) -> Result<Self> {
        Self::new(OperationKind::Swap, network, from_token, to_token, amount, amount_type)
    }

    /// Set slippage tolerance in percent.
    pub fn with_slippage(mut self, slippage: Decimal) -> Self {
        self.slippage = slippage;
        self
    }

    /// Set a limit price.
    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    /// Set the destination network (bridges).
    pub fn with_destination(mut self, network: NetworkId) -> Self {
        self.destination_network = Some(network);
        self
    }

    /// Get the token reference on one side.
    pub fn token(&self, side: TokenSide) -> &TokenRef {
        match side {
            TokenSide::From => &self.from_token,
            TokenSide::To => &self.to_token,
        }
    }

    /// Network a token reference on `side` lives on.
    ///
    /// The receiving side of a bridge lives on the destination network.
    pub fn network_for(&self, side: TokenSide) -> &NetworkId {
        match (side, self.kind, &self.destination_network) {
            (TokenSide::To, OperationKind::Bridge, Some(destination)) => destination,
            _ => &self.network,
        }
    }

    /// Return a copy with one token reference replaced.
    pub fn with_token(&self, side: TokenSide, token: TokenRef) -> Self {
        let mut next = self.clone();
        match side {
            TokenSide::From => next.from_token = token,
            TokenSide::To => next.to_token = token,
        }
        next
    }

    /// Find which side, if any, carries the given reference.
    pub fn side_of(&self, token: &TokenRef) -> Option<TokenSide> {
        if &self.from_token == token {
            Some(TokenSide::From)
        } else if &self.to_token == token {
            Some(TokenSide::To)
        } else {
            None
        }
    }
}
