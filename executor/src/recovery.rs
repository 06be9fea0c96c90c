//! One-shot recovery from unresolved token symbols.

use std::future::Future;
use std::sync::Arc;

use intentroute_common::{IntentError, OperationParams, Result, TokenRef, TokenSide, TokenTable};
use tracing::{debug, info};

use crate::config::RecoveryConfig;
use crate::metrics::Metrics;

/// Parameters of one attempt plus how many attempts came before it.
///
/// Passed by value into every attempt; a retry gets a fresh context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub params: OperationParams,
    pub attempt: u32,
}

impl RequestContext {
    /// Context of a first attempt.
    pub fn new(params: OperationParams) -> Self {
        Self { params, attempt: 0 }
    }

    /// Context of the attempt after this one.
    pub fn retry_with(&self, params: OperationParams) -> Self {
        Self {
            params,
            attempt: self.attempt + 1,
        }
    }

    /// Whether this attempt is itself a retry.
    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }
}

/// Retries an attempt at most once, after rewriting a token symbol into
/// the address the static token table knows it by.
pub struct ErrorRecovery {
    tokens: Arc<dyn TokenTable>,
    metrics: Arc<Metrics>,
    config: RecoveryConfig,
}

impl ErrorRecovery {
    /// Create a new recovery wrapper.
    pub fn new(tokens: Arc<dyn TokenTable>, metrics: Arc<Metrics>, config: RecoveryConfig) -> Self {
        Self {
            tokens,
            metrics,
            config,
        }
    }

    /// Run `attempt`, retrying once with corrected parameters if the
    /// failure is a recoverable token lookup error.
    ///
    /// Any other error, or a failure of the retry itself, is returned
    /// unchanged.
    pub async fn run<T, F, Fut>(&self, context: RequestContext, attempt: F) -> Result<T>
    where
        F: Fn(RequestContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let error = match attempt(context.clone()).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let Some(next) = self.corrected(&context, &error) else {
            return Err(error);
        };

        self.metrics.recovery_retry();
        info!(
            network = %next.params.network,
            from_token = %next.params.from_token,
            to_token = %next.params.to_token,
            attempt = next.attempt,
            "Retrying with resolved token address"
        );
        attempt(next).await
    }

    /// Context for a retry, if `error` is recoverable from `context`.
    pub fn corrected(&self, context: &RequestContext, error: &IntentError) -> Option<RequestContext> {
        if !self.config.enabled || context.is_retry() {
            return None;
        }

        let reference = error.unresolved_token()?;
        let Some(offending) = context.params.side_of(reference) else {
            debug!(token = %reference, "Unresolved token is not a parameter of this operation");
            return None;
        };

        // Every symbol is rewritten so one retry covers both sides.
        let mut params = context.params.clone();
        let mut rewritten = Vec::with_capacity(2);
        for side in [TokenSide::From, TokenSide::To] {
            if let Some(resolved) = self.resolve(&context.params, side) {
                params = params.with_token(side, resolved);
                rewritten.push(side);
            }
        }

        if !rewritten.contains(&offending) {
            debug!(
                token = %reference,
                network = %context.params.network_for(offending),
                "No known symbol"
            );
            return None;
        }
        Some(context.retry_with(params))
    }

    /// Address for the reference on `side`, if it is a known symbol on the
    /// network that side lives on.
    fn resolve(&self, params: &OperationParams, side: TokenSide) -> Option<TokenRef> {
        let reference = params.token(side);
        let network = params.network_for(side);
        let token = self.tokens.resolve_symbol(network, reference.as_str())?;
        let resolved = TokenRef::from(&token.address);
        if resolved == *reference {
            return None;
        }

        debug!(
            token = %reference,
            side = %side,
            network = %network,
            address = %token.address,
            "Resolved token symbol"
        );
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentroute_common::{
        AmountType, NetworkId, OperationKind, ProviderFailure, StaticTokenTable,
    };
    use std::sync::Mutex;

    const BINK: &str = "0x5fdfafd107fc267bd6d6b1c08fcafb8d31394ba1";
    const USDT: &str = "0x55d398326f99059ff775485246999027b3197955";

    fn recovery(enabled: bool) -> (ErrorRecovery, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let recovery = ErrorRecovery::new(
            Arc::new(StaticTokenTable::builtin()),
            metrics.clone(),
            RecoveryConfig { enabled },
        );
        (recovery, metrics)
    }

    fn params(from: &str) -> OperationParams {
        OperationParams::swap(NetworkId::bnb(), from, USDT, "100", AmountType::Input).unwrap()
    }

    fn not_found(params: &OperationParams) -> IntentError {
        IntentError::TokenNotFound {
            reference: params.from_token.clone(),
            network: params.network.clone(),
        }
    }

    #[tokio::test]
    async fn test_retries_once_with_resolved_address() {
        let (recovery, metrics) = recovery(true);
        let seen = Mutex::new(Vec::new());

        let result = recovery
            .run(RequestContext::new(params("BINK")), |ctx| {
                seen.lock().unwrap().push(ctx.clone());
                async move {
                    if ctx.params.from_token.as_str() == BINK {
                        Ok(ctx.attempt)
                    } else {
                        Err(not_found(&ctx.params))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].params.from_token.as_str(), "BINK");
        assert_eq!(seen[1].params.from_token.as_str(), BINK);
        assert_eq!(seen[1].params.to_token, seen[0].params.to_token);
        assert_eq!(metrics.snapshot().recovery_retries, 1);
    }

    #[tokio::test]
    async fn test_second_failure_is_not_retried() {
        let (recovery, _) = recovery(true);
        let calls = Mutex::new(0);

        let result: Result<()> = recovery
            .run(RequestContext::new(params("BINK")), |ctx| {
                *calls.lock().unwrap() += 1;
                async move {
                    Err(IntentError::TokenNotFound {
                        reference: TokenRef::new("BINK"),
                        network: ctx.params.network,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(IntentError::TokenNotFound { .. })));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_surfaces_original_error() {
        let (recovery, metrics) = recovery(true);
        let calls = Mutex::new(0);

        let result: Result<()> = recovery
            .run(RequestContext::new(params("NOPE")), |ctx| {
                *calls.lock().unwrap() += 1;
                async move { Err(not_found(&ctx.params)) }
            })
            .await;

        match result {
            Err(IntentError::TokenNotFound { reference, .. }) => assert_eq!(reference.as_str(), "NOPE"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(metrics.snapshot().recovery_retries, 0);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let (recovery, _) = recovery(true);
        let calls = Mutex::new(0);

        let result: Result<()> = recovery
            .run(RequestContext::new(params("BINK")), |_| {
                *calls.lock().unwrap() += 1;
                async { Err(IntentError::InsufficientBalance("empty".into())) }
            })
            .await;

        assert!(matches!(result, Err(IntentError::InsufficientBalance(_))));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_fanout_token_failures_are_recoverable() {
        let (recovery, _) = recovery(true);
        let context = RequestContext::new(params("BINK"));
        let error = IntentError::NoQuoteAvailable {
            network: NetworkId::bnb(),
            failures: vec![
                ProviderFailure::new("a", not_found(&context.params)),
                ProviderFailure::new("b", not_found(&context.params)),
            ],
        };

        let next = recovery.corrected(&context, &error).unwrap();

        assert_eq!(next.attempt, 1);
        assert_eq!(next.params.from_token.as_str(), BINK);
    }

    #[test]
    fn test_disabled_or_retried_contexts_are_final() {
        let context = RequestContext::new(params("BINK"));
        let error = not_found(&context.params);

        let (disabled, _) = recovery(false);
        assert!(disabled.corrected(&context, &error).is_none());

        let (enabled, _) = recovery(true);
        let retried = context.retry_with(context.params.clone());
        assert!(enabled.corrected(&retried, &error).is_none());
    }

    #[test]
    fn test_both_symbols_rewritten_in_one_retry() {
        let (recovery, _) = recovery(true);
        let params =
            OperationParams::swap(NetworkId::bnb(), "BINK", "USDT", "100", AmountType::Input).unwrap();
        let context = RequestContext::new(params);

        let next = recovery.corrected(&context, &not_found(&context.params)).unwrap();

        assert_eq!(next.attempt, 1);
        assert_eq!(next.params.from_token.as_str(), BINK);
        assert_eq!(next.params.to_token.as_str(), USDT);
    }

    #[test]
    fn test_unknown_offending_symbol_blocks_partial_rewrite() {
        let (recovery, _) = recovery(true);
        let params =
            OperationParams::swap(NetworkId::bnb(), "NOPE", "USDT", "100", AmountType::Input).unwrap();
        let context = RequestContext::new(params);

        assert!(recovery.corrected(&context, &not_found(&context.params)).is_none());
    }

    #[test]
    fn test_bridge_receiving_symbol_resolves_on_destination() {
        let (recovery, _) = recovery(true);
        let params = OperationParams::new(
            OperationKind::Bridge,
            NetworkId::bnb(),
            USDT,
            "USDC",
            "10",
            AmountType::Input,
        )
        .unwrap()
        .with_destination(NetworkId::solana());
        let context = RequestContext::new(params);
        let error = IntentError::TokenNotFound {
            reference: TokenRef::new("USDC"),
            network: NetworkId::solana(),
        };

        let next = recovery.corrected(&context, &error).unwrap();

        assert_eq!(next.params.to_token.as_str(), "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        assert_eq!(next.params.from_token.as_str(), USDT);
        assert_eq!(next.params.destination_network, Some(NetworkId::solana()));
    }
}
