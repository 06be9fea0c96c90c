//! The result record returned to callers of an operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{IntentError, NetworkId, OperationKind, Quote, TokenInfo, TxHash};

/// Final status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Structured result of a swap, stake or bridge.
///
/// Callers always get one of these, never a bare error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Success or error.
    pub status: OperationStatus,
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Network the operation ran on.
    pub network: NetworkId,
    /// Provider that executed (or was selected).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Token spent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_token: Option<TokenInfo>,
    /// Token received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_token: Option<TokenInfo>,
    /// Amount spent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_amount: Option<Decimal>,
    /// Amount received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount: Option<Decimal>,
    /// Hash of the primary transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    /// Hash of the approval transaction, if one was needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_hash: Option<TxHash>,
    /// Hash of the native wrap transaction, if one was needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_hash: Option<TxHash>,
    /// Price impact in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<Decimal>,
    /// Error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Diagnostic details (network, token, provider failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OperationResult {
    /// Build a success record from the executed quote.
    pub fn success(quote: &Quote, transaction_hash: TxHash) -> Self {
        Self {
            status: OperationStatus::Success,
            kind: quote.params.kind,
            network: quote.network.clone(),
            provider: Some(quote.provider.clone()),
            from_token: Some(quote.from_token.clone()),
            to_token: Some(quote.to_token.clone()),
            from_amount: Some(quote.from_amount),
            to_amount: Some(quote.to_amount),
            transaction_hash: Some(transaction_hash),
            approval_hash: None,
            wrap_hash: None,
            price_impact: quote.price_impact,
            message: None,
            error_code: None,
            details: None,
        }
    }

    /// Build an error record.
    pub fn failure(kind: OperationKind, network: NetworkId, error: &IntentError) -> Self {
        Self {
            status: OperationStatus::Error,
            kind,
            network,
            provider: None,
            from_token: None,
            to_token: None,
            from_amount: None,
            to_amount: None,
            transaction_hash: None,
            approval_hash: None,
            wrap_hash: None,
            price_impact: None,
            message: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
            details: error.details(),
        }
    }

    /// Attach an approval transaction hash.
    pub fn with_approval_hash(mut self, hash: Option<TxHash>) -> Self {
        self.approval_hash = hash;
        self
    }

    /// Attach a wrap transaction hash.
    pub fn with_wrap_hash(mut self, hash: Option<TxHash>) -> Self {
        self.wrap_hash = hash;
        self
    }

    /// Record the provider involved in a failure.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}
