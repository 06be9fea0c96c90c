//! Operation entry points: swap, stake and bridge.

use std::sync::Arc;

use intentroute_common::{
    Clock, IntentError, OperationKind, OperationParams, OperationResult, Quote,
    Result, TokenSide, TokenTable,
};
use intentroute_quote::{BestQuote, Provider, ProviderRegistry, QuoteCache, QuoteEngine};
use intentroute_wallet::Wallet;
use tracing::{error, info, instrument};

use crate::config::RouterConfig;
use crate::metrics::Metrics;
use crate::pipeline::{Execution, TransactionPipeline};
use crate::recovery::{ErrorRecovery, RequestContext};

/// Routes operations to the best provider and executes them.
pub struct IntentRouter {
    registry: Arc<ProviderRegistry>,
    engine: QuoteEngine,
    pipeline: TransactionPipeline,
    recovery: ErrorRecovery,
    wallet: Arc<dyn Wallet>,
    metrics: Arc<Metrics>,
}

impl IntentRouter {
    /// Create a new router.
    pub fn new(
        config: RouterConfig,
        wallet: Arc<dyn Wallet>,
        tokens: Arc<dyn TokenTable>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(ProviderRegistry::new());
        let cache = Arc::new(QuoteCache::with_config(clock.clone(), config.cache.clone()));
        let metrics = Arc::new(Metrics::new());

        let engine = QuoteEngine::new(registry.clone(), cache.clone(), clock, config.quote);
        let pipeline = TransactionPipeline::new(
            registry.clone(),
            cache,
            wallet.clone(),
            metrics.clone(),
            config.pipeline,
        );
        let recovery = ErrorRecovery::new(tokens, metrics.clone(), config.recovery);

        Self {
            registry,
            engine,
            pipeline,
            recovery,
            wallet,
            metrics,
        }
    }

    /// Register a provider.
    pub fn register_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        self.registry.register(provider)
    }

    /// Provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Quote cache.
    pub fn cache(&self) -> &Arc<QuoteCache> {
        self.engine.cache()
    }

    /// Router counters.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run the quote cache sweeper in the background.
    pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.cache().clone().run_sweeper())
    }

    /// Exchange one token for another.
    pub async fn swap(&self, params: OperationParams) -> OperationResult {
        self.run_kind(OperationKind::Swap, params).await
    }

    /// Stake a token.
    pub async fn stake(&self, params: OperationParams) -> OperationResult {
        self.run_kind(OperationKind::Stake, params).await
    }

    /// Move a token to another network.
    pub async fn bridge(&self, params: OperationParams) -> OperationResult {
        if params.destination_network.is_none() {
            let err = IntentError::Unsupported("bridge requires a destination network".into());
            return OperationResult::failure(OperationKind::Bridge, params.network, &err);
        }
        self.run_kind(OperationKind::Bridge, params).await
    }

    async fn run_kind(&self, kind: OperationKind, params: OperationParams) -> OperationResult {
        if params.kind != kind {
            let err = IntentError::Unsupported(format!(
                "{} parameters submitted as a {}",
                params.kind, kind
            ));
            return OperationResult::failure(kind, params.network, &err);
        }
        self.execute_operation(params).await
    }

    /// Quote and execute an operation, recovering once from an unresolved
    /// token symbol.
    ///
    /// Never fails: errors come back as an error record.
    #[instrument(skip(self, params), fields(
        kind = %params.kind,
        network = %params.network,
        from_token = %params.from_token,
        to_token = %params.to_token,
    ))]
    pub async fn execute_operation(&self, params: OperationParams) -> OperationResult {
        let kind = params.kind;
        let network = params.network.clone();
        self.metrics.operation_started();

        let outcome = self
            .recovery
            .run(RequestContext::new(params), |context| self.attempt(context))
            .await;

        match outcome {
            Ok(execution) => {
                self.metrics.operation_succeeded();
                info!(
                    provider = ?execution.result.provider,
                    transaction_hash = ?execution.result.transaction_hash,
                    "Operation succeeded"
                );
                execution.result
            }
            Err(err) => {
                self.metrics.operation_failed();
                error!(code = err.error_code(), error = %err, "Operation failed");
                OperationResult::failure(kind, network, &err)
            }
        }
    }

    /// Get the best quote without executing it.
    pub async fn get_quote(&self, params: &OperationParams) -> Result<BestQuote> {
        params.network.require_spec()?;
        validate_token_refs(params)?;
        let caller = self.wallet.get_address(&params.network).await?;
        let best = self.engine.get_best_quote(params, &caller).await?;
        self.metrics.provider_failures(best.failures.len());
        Ok(best)
    }

    /// Execute a previously obtained quote with this router's wallet.
    pub async fn execute_quote(&self, quote: &Quote) -> OperationResult {
        self.metrics.operation_started();

        let outcome = match self.wallet.get_address(&quote.network).await {
            Ok(address) => self.pipeline.execute(quote, &address).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(execution) => {
                self.metrics.operation_succeeded();
                execution.result
            }
            Err(err) => {
                self.metrics.operation_failed();
                error!(quote_id = %quote.id, error = %err, "Quote execution failed");
                OperationResult::failure(quote.params.kind, quote.network.clone(), &err)
                    .with_provider(quote.provider.clone())
            }
        }
    }

    /// One end-to-end attempt: validate, quote, execute.
    async fn attempt(&self, context: RequestContext) -> Result<Execution> {
        let best = self.get_quote(&context.params).await?;
        let caller = best.quote.originator.clone();
        self.pipeline.execute(&best.quote, &caller).await
    }
}

/// Token references must be addresses on the network each side lives on.
fn validate_token_refs(params: &OperationParams) -> Result<()> {
    for side in [TokenSide::From, TokenSide::To] {
        let network = params.network_for(side);
        let reference = params.token(side);
        if !reference.is_address_for(network.require_spec()?.family) {
            return Err(IntentError::TokenNotFound {
                reference: reference.clone(),
                network: network.clone(),
            });
        }
    }
    Ok(())
}
