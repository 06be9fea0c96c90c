//! Quote execution: validate, wrap, build, balance check, approve, execute.

use std::sync::Arc;

use intentroute_common::{
    Address, IntentError, NetworkId, NetworkSpec, OperationResult, Quote, Result, TxDescriptor,
    TxHash,
};
use intentroute_quote::{Provider, ProviderRegistry, QuoteCache};
use intentroute_wallet::{Receipt, Wallet};
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::metrics::Metrics;
use crate::stage::{PipelineStage, PipelineTrace};

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub result: OperationResult,
    pub trace: PipelineTrace,
}

/// Runs one quote to completion.
///
/// Stages run strictly in order. In particular an approval is confirmed
/// before the primary transaction is handed to the wallet.
pub struct TransactionPipeline {
    registry: Arc<ProviderRegistry>,
    cache: Arc<QuoteCache>,
    wallet: Arc<dyn Wallet>,
    metrics: Arc<Metrics>,
    config: PipelineConfig,
}

impl TransactionPipeline {
    /// Create a new pipeline.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<QuoteCache>,
        wallet: Arc<dyn Wallet>,
        metrics: Arc<Metrics>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            wallet,
            metrics,
            config,
        }
    }

    /// Execute a quote on behalf of `wallet_address`.
    #[instrument(skip(self, quote), fields(
        quote_id = %quote.id,
        provider = %quote.provider,
        network = %quote.network,
    ))]
    pub async fn execute(&self, quote: &Quote, wallet_address: &Address) -> Result<Execution> {
        let mut trace = PipelineTrace::new();

        match self.run(quote, wallet_address, &mut trace).await {
            Ok(result) => {
                info!(
                    transaction_hash = ?result.transaction_hash,
                    approval_hash = ?trace.approval_hash,
                    wrap_hash = ?trace.wrap_hash,
                    "Pipeline completed"
                );
                Ok(Execution { result, trace })
            }
            Err(err) => {
                let stage = trace.fail();
                error!(stage = %stage, error = %err, "Pipeline failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        quote: &Quote,
        wallet_address: &Address,
        trace: &mut PipelineTrace,
    ) -> Result<OperationResult> {
        trace.advance(PipelineStage::Validate)?;
        let quote = self.validate(quote, wallet_address)?;
        let provider = self.registry.by_name(&quote.provider)?;
        let spec = quote.network.require_spec()?;
        let network = &quote.network;

        let working = if self.needs_wrap(&quote, spec) {
            trace.advance(PipelineStage::Wrap)?;
            let wrapped = spec.wrapped_native_token();
            let amount = quote.required_amount()?;
            let tx = provider
                .wrap_token(amount, &wrapped.address)
                .await
                .map_err(|e| at_stage(PipelineStage::Wrap, e))?;
            let receipt = self
                .send_and_confirm(PipelineStage::Wrap, network, &tx)
                .await?;
            self.metrics.wrap_issued();
            trace.wrap_hash = Some(receipt.hash);
            quote.with_source_token(wrapped)
        } else {
            quote.clone()
        };

        trace.advance(PipelineStage::Build)?;
        let tx = provider
            .build_transaction(&working, wallet_address)
            .await
            .map_err(|e| at_stage(PipelineStage::Build, e))?;

        trace.advance(PipelineStage::BalanceCheck)?;
        let balance = provider
            .check_balance(&working, wallet_address)
            .await
            .map_err(|e| at_stage(PipelineStage::BalanceCheck, e))?;
        if !balance.is_valid {
            let message = balance
                .message
                .unwrap_or_else(|| format!("not enough {} to cover the quote", working.from_token.symbol));
            return Err(IntentError::InsufficientBalance(message));
        }

        match &tx.spender {
            Some(spender) if spec.supports_allowance() => {
                trace.advance(PipelineStage::Approve)?;
                trace.approval_hash = self
                    .ensure_allowance(provider.as_ref(), &working, wallet_address, spender)
                    .await?;
            }
            Some(spender) => {
                debug!(spender = %spender, "Network has no allowance model, skipping approval");
            }
            None => {}
        }

        trace.advance(PipelineStage::Execute)?;
        let receipt = self
            .send_and_confirm(PipelineStage::Execute, network, &tx)
            .await?;

        trace.advance(PipelineStage::Invalidate)?;
        self.invalidate_balances(provider.as_ref(), &quote, &working, wallet_address)
            .await;

        trace.advance(PipelineStage::Done)?;
        Ok(OperationResult::success(&quote, receipt.hash)
            .with_approval_hash(trace.approval_hash.clone())
            .with_wrap_hash(trace.wrap_hash.clone()))
    }

    /// Check the quote against the cache and bind it to the caller.
    fn validate(&self, quote: &Quote, wallet_address: &Address) -> Result<Quote> {
        let cached = self.cache.get(&quote.id)?;

        let same_terms = cached.provider == quote.provider
            && cached.network == quote.network
            && cached.from_token == quote.from_token
            && cached.to_token == quote.to_token
            && cached.from_amount == quote.from_amount
            && cached.to_amount == quote.to_amount
            && cached.expires_at == quote.expires_at;
        if !same_terms {
            warn!(quote_id = %quote.id, "Quote differs from the issued quote");
            return Err(IntentError::QuoteExpiredOrInvalid(quote.id));
        }

        if cached.originator != *wallet_address {
            return Err(IntentError::SenderMismatch {
                expected: cached.originator,
                actual: wallet_address.clone(),
            });
        }

        Ok(cached)
    }

    fn needs_wrap(&self, quote: &Quote, spec: &NetworkSpec) -> bool {
        self.config.wrap_on_limit_orders
            && quote.params.limit_price.is_some()
            && spec.is_native(&quote.from_token.address)
    }

    /// Make sure `spender` may move the quoted amount, approving if needed.
    ///
    /// Returns the approval hash once the approval is confirmed.
    async fn ensure_allowance(
        &self,
        provider: &dyn Provider,
        quote: &Quote,
        owner: &Address,
        spender: &Address,
    ) -> Result<Option<TxHash>> {
        let required = quote.required_amount()?;
        let token = &quote.from_token.address;
        let allowance = provider
            .check_allowance(&quote.network, token, owner, spender)
            .await
            .map_err(|e| at_stage(PipelineStage::Approve, e))?;

        if allowance >= required {
            debug!(spender = %spender, allowance, required, "Allowance sufficient");
            return Ok(None);
        }

        let amount = self.config.approval_policy.amount_for(required);
        info!(
            spender = %spender,
            token = %token,
            allowance,
            required,
            amount,
            "Allowance insufficient, approving"
        );

        let approve = provider
            .build_approve_transaction(&quote.network, token, spender, amount, owner)
            .await
            .map_err(|e| at_stage(PipelineStage::Approve, e))?;
        let receipt = self
            .send_and_confirm(PipelineStage::Approve, &quote.network, &approve)
            .await?;
        self.metrics.approval_issued();

        Ok(Some(receipt.hash))
    }

    /// Sign, send and wait for confirmation.
    async fn send_and_confirm(
        &self,
        stage: PipelineStage,
        network: &NetworkId,
        tx: &TxDescriptor,
    ) -> Result<Receipt> {
        let pending = self
            .wallet
            .sign_and_send_transaction(network, tx)
            .await
            .map_err(|e| at_stage(stage, e))?;
        debug!(stage = %stage, hash = %pending.hash(), "Awaiting confirmation");

        let receipt = pending.wait().await.map_err(|e| at_stage(stage, e))?;
        info!(
            stage = %stage,
            hash = %receipt.hash,
            block = receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    /// Best effort; failures are logged and counted only.
    async fn invalidate_balances(
        &self,
        provider: &dyn Provider,
        quote: &Quote,
        working: &Quote,
        owner: &Address,
    ) {
        let mut tokens = vec![&working.from_token.address, &working.to_token.address];
        if quote.from_token.address != working.from_token.address {
            tokens.push(&quote.from_token.address);
        }

        for token in tokens {
            if let Err(e) = provider
                .invalidate_balance_cache(token, owner, &quote.network)
                .await
            {
                self.metrics.invalidation_failed();
                warn!(token = %token, error = %e, "Failed to invalidate balance cache");
            }
        }
    }
}

/// Attribute a collaborator failure to a pipeline stage.
fn at_stage(stage: PipelineStage, error: IntentError) -> IntentError {
    match error {
        IntentError::TransactionFailed { reason, .. } => {
            IntentError::transaction_failed(stage.as_str(), reason)
        }
        other => IntentError::transaction_failed(stage.as_str(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalPolicy;
    use chrono::Duration;
    use intentroute_common::{
        AmountType, BalanceCheck, ManualClock, OperationParams, TokenInfo,
    };
    use intentroute_quote::{MockCall, MockProvider, QuoteEngine, QuoteEngineConfig};
    use intentroute_wallet::{InMemoryWallet, WalletEvent};
    use rust_decimal_macros::dec;

    const USDT: &str = "0x55d398326f99059ff775485246999027b3197955";
    const CAKE: &str = "0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82";
    const NATIVE: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
    const ROUTER: &str = "0x10ed43c718714eb63d5aa57b78b54704e256024e";

    fn owner() -> Address {
        Address::new("0x00000000000000000000000000000000000000aa")
    }

    struct Harness {
        pipeline: TransactionPipeline,
        engine: QuoteEngine,
        provider: Arc<MockProvider>,
        wallet: Arc<InMemoryWallet>,
        clock: Arc<ManualClock>,
        metrics: Arc<Metrics>,
    }

    impl Harness {
        async fn quote(&self, params: OperationParams) -> Quote {
            self.engine
                .get_best_quote(&params, &owner())
                .await
                .unwrap()
                .quote
        }

        async fn swap_quote(&self) -> Quote {
            self.quote(
                OperationParams::swap(NetworkId::bnb(), USDT, CAKE, "10", AmountType::Input)
                    .unwrap(),
            )
            .await
        }
    }

    fn harness_with(provider: MockProvider, config: PipelineConfig) -> Harness {
        let provider = Arc::new(provider);
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(provider.clone()).unwrap();

        let clock = Arc::new(ManualClock::starting_now());
        let cache = Arc::new(QuoteCache::new(clock.clone()));
        let wallet = Arc::new(InMemoryWallet::new(owner()));
        let metrics = Arc::new(Metrics::new());

        let engine = QuoteEngine::new(
            registry.clone(),
            cache.clone(),
            clock.clone(),
            QuoteEngineConfig::default(),
        );
        let pipeline =
            TransactionPipeline::new(registry, cache, wallet.clone(), metrics.clone(), config);

        Harness {
            pipeline,
            engine,
            provider,
            wallet,
            clock,
            metrics,
        }
    }

    fn harness(provider: MockProvider) -> Harness {
        harness_with(provider, PipelineConfig::default())
    }

    fn venue() -> MockProvider {
        MockProvider::new("pancakeswap", vec![NetworkId::bnb()])
            .with_quote(dec!(10), dec!(4))
            .with_token(TokenInfo::new(Address::new(USDT), 18, "USDT"))
            .with_token(TokenInfo::new(Address::new(CAKE), 18, "CAKE"))
    }

    fn spender() -> Address {
        Address::new(ROUTER)
    }

    #[tokio::test]
    async fn test_execute_without_approval() {
        let h = harness(venue());
        let quote = h.swap_quote().await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        let sent = h.wallet.sent();
        assert_eq!(sent.len(), 1);
        assert!(execution.result.is_success());
        assert_eq!(execution.result.transaction_hash, Some(sent[0].hash.clone()));
        assert_eq!(execution.result.provider.as_deref(), Some("pancakeswap"));
        assert_eq!(execution.result.to_amount, Some(dec!(4)));
        assert_eq!(
            execution.trace.stages(),
            &[
                PipelineStage::Init,
                PipelineStage::Validate,
                PipelineStage::Build,
                PipelineStage::BalanceCheck,
                PipelineStage::Execute,
                PipelineStage::Invalidate,
                PipelineStage::Done,
            ]
        );
        assert_eq!(
            h.provider
                .count_calls(|c| matches!(c, MockCall::InvalidateBalanceCache { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_approval_confirmed_before_primary_send() {
        let h = harness(venue().with_spender(spender()).with_allowance(0));
        let quote = h.swap_quote().await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        let sent = h.wallet.sent();
        assert_eq!(sent.len(), 2);
        let (approve, primary) = (&sent[0], &sent[1]);
        assert_eq!(approve.tx.to, Address::new(USDT));
        assert_eq!(primary.tx.spender, Some(spender()));
        assert_eq!(
            h.wallet.events(),
            vec![
                WalletEvent::Sent(approve.hash.clone()),
                WalletEvent::Confirmed(approve.hash.clone()),
                WalletEvent::Sent(primary.hash.clone()),
                WalletEvent::Confirmed(primary.hash.clone()),
            ]
        );
        assert_eq!(execution.result.approval_hash, Some(approve.hash.clone()));
        assert!(h.provider.calls().contains(&MockCall::BuildApprove {
            amount: 10_000_000_000_000_000_000
        }));
        assert_eq!(h.metrics.snapshot().approvals_issued, 1);
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let required = 10_000_000_000_000_000_000u128;
        let h = harness(venue().with_spender(spender()).with_allowance(required));
        let quote = h.swap_quote().await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        assert_eq!(h.wallet.sent().len(), 1);
        assert!(execution.result.approval_hash.is_none());
        assert!(execution.trace.visited(PipelineStage::Approve));
        assert_eq!(
            h.provider
                .count_calls(|c| matches!(c, MockCall::BuildApprove { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_unlimited_approval_policy() {
        let config = PipelineConfig {
            approval_policy: ApprovalPolicy::Unlimited,
            ..Default::default()
        };
        let h = harness_with(venue().with_spender(spender()).with_allowance(1), config);
        let quote = h.swap_quote().await;

        h.pipeline.execute(&quote, &owner()).await.unwrap();

        assert!(h
            .provider
            .calls()
            .contains(&MockCall::BuildApprove { amount: u128::MAX }));
    }

    #[tokio::test]
    async fn test_reverted_approval_blocks_primary() {
        let h = harness(venue().with_spender(spender()).with_allowance(0));
        h.wallet.revert_sends_to(Address::new(USDT));
        let quote = h.swap_quote().await;

        let err = h.pipeline.execute(&quote, &owner()).await.unwrap_err();

        assert!(matches!(
            err,
            IntentError::TransactionFailed { ref stage, .. } if stage == "APPROVE"
        ));
        assert_eq!(h.wallet.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_quote_rejected() {
        let h = harness(venue());
        let quote = h.swap_quote().await;

        h.clock.advance(Duration::minutes(5) + Duration::milliseconds(1));
        let err = h.pipeline.execute(&quote, &owner()).await.unwrap_err();

        assert!(matches!(err, IntentError::QuoteExpiredOrInvalid(id) if id == quote.id));
        assert!(h.wallet.sent().is_empty());
        assert_eq!(
            h.provider
                .count_calls(|c| matches!(c, MockCall::BuildTransaction { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_quote_usable_until_expiry() {
        let h = harness(venue());
        let quote = h.swap_quote().await;

        h.clock.advance(Duration::minutes(5) - Duration::milliseconds(1));

        assert!(h.pipeline.execute(&quote, &owner()).await.is_ok());
    }

    #[tokio::test]
    async fn test_sender_mismatch() {
        let h = harness(venue());
        let quote = h.swap_quote().await;
        let other = Address::new("0x00000000000000000000000000000000000000bb");

        let err = h.pipeline.execute(&quote, &other).await.unwrap_err();

        match err {
            IntentError::SenderMismatch { expected, actual } => {
                assert_eq!(expected, owner());
                assert_eq!(actual, other);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_quote_rejected() {
        let h = harness(venue());
        let mut quote = h.swap_quote().await;
        quote.to_amount = dec!(400);

        let err = h.pipeline.execute(&quote, &owner()).await.unwrap_err();

        assert!(matches!(err, IntentError::QuoteExpiredOrInvalid(_)));
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let h = harness(venue().with_balance(BalanceCheck::invalid("USDT balance 3 < 10")));
        let quote = h.swap_quote().await;

        let err = h.pipeline.execute(&quote, &owner()).await.unwrap_err();

        assert!(matches!(err, IntentError::InsufficientBalance(ref m) if m == "USDT balance 3 < 10"));
        assert!(h.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn test_build_failure_is_fatal() {
        let h = harness(venue().with_failing_build());
        let quote = h.swap_quote().await;

        let err = h.pipeline.execute(&quote, &owner()).await.unwrap_err();

        assert!(matches!(
            err,
            IntentError::TransactionFailed { ref stage, .. } if stage == "BUILD"
        ));
        assert_eq!(h.provider.count_calls(|c| *c == MockCall::CheckBalance), 0);
    }

    #[tokio::test]
    async fn test_invalidation_failure_keeps_success() {
        let h = harness(venue().with_failing_invalidation());
        let quote = h.swap_quote().await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        assert!(execution.result.is_success());
        assert_eq!(execution.trace.current(), PipelineStage::Done);
        assert_eq!(h.metrics.snapshot().invalidation_failures, 2);
    }

    #[tokio::test]
    async fn test_limit_order_wraps_native_asset() {
        let h = harness(venue());
        let params = OperationParams::swap(NetworkId::bnb(), NATIVE, CAKE, "2", AmountType::Input)
            .unwrap()
            .with_limit_price(dec!(0.5));
        let quote = h.quote(params).await;
        let wrapped = Address::new("0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        let sent = h.wallet.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].tx.to, wrapped);
        assert_eq!(sent[0].tx.value, 10_000_000_000_000_000_000);
        assert_eq!(execution.result.wrap_hash, Some(sent[0].hash.clone()));
        assert!(h.provider.calls().contains(&MockCall::BuildTransaction {
            from_token: wrapped
        }));
        assert_eq!(
            h.provider
                .count_calls(|c| matches!(c, MockCall::InvalidateBalanceCache { .. })),
            3
        );
    }

    #[tokio::test]
    async fn test_native_without_limit_price_is_not_wrapped() {
        let h = harness(venue());
        let params =
            OperationParams::swap(NetworkId::bnb(), NATIVE, CAKE, "2", AmountType::Input).unwrap();
        let quote = h.quote(params).await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        assert!(execution.result.wrap_hash.is_none());
        assert_eq!(h.wallet.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_solana_skips_approval() {
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        let bonk = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
        let provider = MockProvider::new("jupiter", vec![NetworkId::solana()])
            .with_spender(spender())
            .with_allowance(0);
        let h = harness(provider);
        let params =
            OperationParams::swap(NetworkId::solana(), usdc, bonk, "5", AmountType::Input).unwrap();
        let quote = h.quote(params).await;

        let execution = h.pipeline.execute(&quote, &owner()).await.unwrap();

        assert_eq!(h.wallet.sent().len(), 1);
        assert!(!execution.trace.visited(PipelineStage::Approve));
        assert_eq!(
            h.provider
                .count_calls(|c| matches!(c, MockCall::CheckAllowance { .. })),
            0
        );
    }
}
