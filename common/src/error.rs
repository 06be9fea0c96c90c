//! Error types for IntentRoute operations.

use serde::Serialize;
use thiserror::Error;

use crate::{Address, NetworkId, QuoteId, TokenRef};

/// Main error type for IntentRoute operations.
#[derive(Error, Debug, Clone)]
pub enum IntentError {
    /// Network is not in the catalog.
    #[error("Network not supported: {0}")]
    NetworkNotSupported(NetworkId),

    /// No provider is registered for the network.
    #[error("No providers registered for network {0}")]
    NoProvidersForNetwork(NetworkId),

    /// Every eligible provider failed to quote.
    #[error("No quote available on {network} ({} provider failures)", .failures.len())]
    NoQuoteAvailable {
        network: NetworkId,
        failures: Vec<ProviderFailure>,
    },

    /// A token reference could not be resolved.
    #[error("Token {reference} not found on {network}")]
    TokenNotFound {
        reference: TokenRef,
        network: NetworkId,
    },

    /// Quote is unknown or past its expiry.
    #[error("Quote {0} expired or invalid")]
    QuoteExpiredOrInvalid(QuoteId),

    /// Quote was issued to a different identity.
    #[error("Sender mismatch: quote issued to {expected}, executed by {actual}")]
    SenderMismatch { expected: Address, actual: Address },

    /// Provider balance check failed.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Signing, submission or confirmation failed.
    #[error("Transaction failed during {stage}: {reason}")]
    TransactionFailed { stage: String, reason: String },

    /// Provider lookup by name failed.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Provider specific failure.
    #[error("Provider {provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Amount could not be parsed or converted.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Capability not offered by a collaborator.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl IntentError {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        IntentError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a transaction failure for a pipeline stage.
    pub fn transaction_failed(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        IntentError::TransactionFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Get error code for result records.
    pub fn error_code(&self) -> &'static str {
        match self {
            IntentError::NetworkNotSupported(_) => "NETWORK_NOT_SUPPORTED",
            IntentError::NoProvidersForNetwork(_) => "NO_PROVIDERS_FOR_NETWORK",
            IntentError::NoQuoteAvailable { .. } => "NO_QUOTE_AVAILABLE",
            IntentError::TokenNotFound { .. } => "TOKEN_NOT_FOUND",
            IntentError::QuoteExpiredOrInvalid(_) => "QUOTE_EXPIRED_OR_INVALID",
            IntentError::SenderMismatch { .. } => "SENDER_MISMATCH",
            IntentError::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            IntentError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            IntentError::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            IntentError::Provider { .. } => "PROVIDER_ERROR",
            IntentError::InvalidAmount(_) => "INVALID_AMOUNT",
            IntentError::Unsupported(_) => "UNSUPPORTED",
            IntentError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// The token reference this error failed to resolve, if any.
    ///
    /// Besides a direct `TokenNotFound`, a `NoQuoteAvailable` counts when
    /// every provider failed on the same unresolved reference.
    pub fn unresolved_token(&self) -> Option<&TokenRef> {
        match self {
            IntentError::TokenNotFound { reference, .. } => Some(reference),
            IntentError::NoQuoteAvailable { failures, .. } => {
                let (first, rest) = failures.split_first()?;
                let reference = first.error.unresolved_token()?;
                rest.iter()
                    .all(|f| f.error.unresolved_token() == Some(reference))
                    .then_some(reference)
            }
            _ => None,
        }
    }

    /// Structured details for result records.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            IntentError::NoQuoteAvailable { network, failures } => Some(serde_json::json!({
                "network": network,
                "failures": failures.iter().map(ProviderFailure::summary).collect::<Vec<_>>(),
            })),
            IntentError::TokenNotFound { reference, network } => Some(serde_json::json!({
                "token": reference,
                "network": network,
            })),
            IntentError::SenderMismatch { expected, actual } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
            })),
            IntentError::TransactionFailed { stage, .. } => Some(serde_json::json!({
                "stage": stage,
            })),
            IntentError::Provider { provider, .. } => Some(serde_json::json!({
                "provider": provider,
            })),
            _ => None,
        }
    }
}

/// Result type alias for IntentRoute operations.
pub type Result<T> = std::result::Result<T, IntentError>;

/// A single provider's failure during quote fanout.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    /// Provider name.
    pub provider: String,
    /// What went wrong.
    pub error: IntentError,
}

impl ProviderFailure {
    /// Create a new provider failure.
    pub fn new(provider: impl Into<String>, error: IntentError) -> Self {
        Self {
            provider: provider.into(),
            error,
        }
    }

    /// Serializable summary.
    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            provider: self.provider.clone(),
            code: self.error.error_code().to_string(),
            message: self.error.to_string(),
        }
    }
}

/// Flattened form of a [`ProviderFailure`] for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub provider: String,
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(reference: &str) -> IntentError {
        IntentError::TokenNotFound {
            reference: TokenRef::new(reference),
            network: NetworkId::bnb(),
        }
    }

    #[test]
    fn test_unresolved_token_direct() {
        let err = not_found("BINK");
        assert_eq!(err.unresolved_token(), Some(&TokenRef::new("BINK")));
        assert_eq!(err.error_code(), "TOKEN_NOT_FOUND");
    }

    #[test]
    fn test_unresolved_token_through_fanout() {
        let err = IntentError::NoQuoteAvailable {
            network: NetworkId::bnb(),
            failures: vec![
                ProviderFailure::new("a", not_found("BINK")),
                ProviderFailure::new("b", not_found("BINK")),
            ],
        };
        assert_eq!(err.unresolved_token(), Some(&TokenRef::new("BINK")));
    }

    #[test]
    fn test_mixed_failures_are_not_token_errors() {
        let err = IntentError::NoQuoteAvailable {
            network: NetworkId::bnb(),
            failures: vec![
                ProviderFailure::new("a", not_found("BINK")),
                ProviderFailure::new("b", IntentError::provider("b", "rate limited")),
            ],
        };
        assert!(err.unresolved_token().is_none());

        let empty = IntentError::NoQuoteAvailable {
            network: NetworkId::bnb(),
            failures: vec![],
        };
        assert!(empty.unresolved_token().is_none());
    }

    #[test]
    fn test_details_list_failures() {
        let err = IntentError::NoQuoteAvailable {
            network: NetworkId::bnb(),
            failures: vec![ProviderFailure::new("a", IntentError::provider("a", "timeout"))],
        };
        let details = err.details().unwrap();
        assert_eq!(details["failures"][0]["provider"], "a");
        assert_eq!(details["failures"][0]["code"], "PROVIDER_ERROR");
    }
}
