//! Provider capability trait and a scriptable mock implementation.

use async_trait::async_trait;
use chrono::Duration;

use intentroute_common::{
    Address, BalanceCheck, IntentError, NetworkId, OperationKind, OperationParams, ProviderQuote,
    Quote, Result, TxDescriptor,
};

/// A backend venue able to price and execute one kind of operation.
///
/// Each method is a suspension point: implementations talk to venue APIs
/// and chain RPC, and are responsible for their own timeouts.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name (unique within a registry).
    fn name(&self) -> &str;

    /// Operation kind this provider serves.
    fn kind(&self) -> OperationKind {
        OperationKind::Swap
    }

    /// Networks this provider can operate on.
    fn supported_networks(&self) -> Vec<NetworkId>;

    /// Validity window for quotes issued from this provider, if it differs
    /// from the engine default.
    fn quote_ttl(&self) -> Option<Duration> {
        None
    }

    /// Price an operation.
    async fn get_quote(&self, params: &OperationParams, caller: &Address) -> Result<ProviderQuote>;

    /// Build the primary transaction realizing a quote.
    async fn build_transaction(&self, quote: &Quote, caller: &Address) -> Result<TxDescriptor>;

    /// Current allowance granted by `owner` to `spender`, in base units.
    async fn check_allowance(
        &self,
        network: &NetworkId,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128>;

    /// Build an approval of `amount` base units for `spender`.
    async fn build_approve_transaction(
        &self,
        network: &NetworkId,
        token: &Address,
        spender: &Address,
        amount: u128,
        owner: &Address,
    ) -> Result<TxDescriptor>;

    /// Check that `caller` can cover the quote.
    async fn check_balance(&self, quote: &Quote, caller: &Address) -> Result<BalanceCheck>;

    /// Drop any cached balance of `token` held for `owner`.
    async fn invalidate_balance_cache(
        &self,
        token: &Address,
        owner: &Address,
        network: &NetworkId,
    ) -> Result<()>;

    /// Build a native-to-wrapped deposit of `amount` base units.
    async fn wrap_token(&self, amount: u128, wrapped_token: &Address) -> Result<TxDescriptor> {
        let _ = (amount, wrapped_token);
        Err(IntentError::Unsupported(format!(
            "{} cannot wrap native assets",
            self.name()
        )))
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use dashmap::DashMap;
    use intentroute_common::TokenInfo;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A call observed by [`MockProvider`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockCall {
        GetQuote,
        BuildTransaction { from_token: Address },
        CheckAllowance { spender: Address },
        BuildApprove { amount: u128 },
        CheckBalance,
        InvalidateBalanceCache { token: Address },
        WrapToken { amount: u128 },
    }

    /// Scriptable provider for tests.
    ///
    /// Token references must be well-formed addresses for the network,
    /// otherwise quoting fails with `TokenNotFound`.
    pub struct MockProvider {
        name: String,
        kind: OperationKind,
        networks: Vec<NetworkId>,
        from_amount: Mutex<Decimal>,
        to_amount: Mutex<Decimal>,
        quote_error: Mutex<Option<IntentError>>,
        unknown_tokens: DashMap<Address, ()>,
        tokens: DashMap<Address, TokenInfo>,
        ttl: Option<Duration>,
        spender: Option<Address>,
        allowance: Mutex<u128>,
        balance: Mutex<BalanceCheck>,
        fail_build: AtomicBool,
        fail_invalidation: AtomicBool,
        panic_on_quote: bool,
        latency: Option<std::time::Duration>,
        calls: Mutex<Vec<MockCall>>,
    }

    impl MockProvider {
        /// Create a new mock provider quoting 1 -> 1.
        pub fn new(name: impl Into<String>, networks: Vec<NetworkId>) -> Self {
            Self {
                name: name.into(),
                kind: OperationKind::Swap,
                networks,
                from_amount: Mutex::new(Decimal::ONE),
                to_amount: Mutex::new(Decimal::ONE),
                quote_error: Mutex::new(None),
                unknown_tokens: DashMap::new(),
                tokens: DashMap::new(),
                ttl: None,
                spender: None,
                allowance: Mutex::new(u128::MAX),
                balance: Mutex::new(BalanceCheck::valid()),
                fail_build: AtomicBool::new(false),
                fail_invalidation: AtomicBool::new(false),
                panic_on_quote: false,
                latency: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Serve a different operation kind.
        pub fn with_kind(mut self, kind: OperationKind) -> Self {
            self.kind = kind;
            self
        }

        /// Set quoted amounts.
        pub fn with_quote(self, from_amount: Decimal, to_amount: Decimal) -> Self {
            *self.from_amount.lock() = from_amount;
            *self.to_amount.lock() = to_amount;
            self
        }

        /// Fail every quote with `error`.
        pub fn failing(self, error: IntentError) -> Self {
            *self.quote_error.lock() = Some(error);
            self
        }

        /// Describe a token (decimals and symbol).
        pub fn with_token(self, token: TokenInfo) -> Self {
            self.tokens.insert(token.address.clone(), token);
            self
        }

        /// Treat a well-formed address as unknown to this venue.
        pub fn with_unknown_token(self, address: Address) -> Self {
            self.unknown_tokens.insert(address, ());
            self
        }

        /// Declare a quote validity window.
        pub fn with_ttl(mut self, ttl: Duration) -> Self {
            self.ttl = Some(ttl);
            self
        }

        /// Require authorization of `spender` for built transactions.
        pub fn with_spender(mut self, spender: Address) -> Self {
            self.spender = Some(spender);
            self
        }

        /// Set the allowance reported by `check_allowance`.
        pub fn with_allowance(self, allowance: u128) -> Self {
            *self.allowance.lock() = allowance;
            self
        }

        /// Set the balance check result.
        pub fn with_balance(self, balance: BalanceCheck) -> Self {
            *self.balance.lock() = balance;
            self
        }

        /// Fail `build_transaction`.
        pub fn with_failing_build(self) -> Self {
            self.fail_build.store(true, Ordering::SeqCst);
            self
        }

        /// Fail `invalidate_balance_cache`.
        pub fn with_failing_invalidation(self) -> Self {
            self.fail_invalidation.store(true, Ordering::SeqCst);
            self
        }

        /// Panic inside `get_quote`.
        pub fn panicking(mut self) -> Self {
            self.panic_on_quote = true;
            self
        }

        /// Delay every quote.
        pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Calls observed so far.
        pub fn calls(&self) -> Vec<MockCall> {
            self.calls.lock().clone()
        }

        /// Number of calls matching a predicate.
        pub fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
            self.calls.lock().iter().filter(|c| predicate(c)).count()
        }

        fn record(&self, call: MockCall) {
            self.calls.lock().push(call);
        }

        fn resolve(&self, params: &OperationParams, side: intentroute_common::TokenSide) -> Result<TokenInfo> {
            let reference = params.token(side);
            let network = params.network_for(side);
            let family = network.require_spec()?.family;
            let not_found = || IntentError::TokenNotFound {
                reference: reference.clone(),
                network: network.clone(),
            };

            if !reference.is_address_for(family) {
                return Err(not_found());
            }
            let address = reference.to_address();
            if self.unknown_tokens.contains_key(&address) {
                return Err(not_found());
            }
            Ok(self
                .tokens
                .get(&address)
                .map(|t| t.clone())
                .unwrap_or_else(|| TokenInfo::new(address, 18, "TKN")))
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> OperationKind {
            self.kind
        }

        fn supported_networks(&self) -> Vec<NetworkId> {
            self.networks.clone()
        }

        fn quote_ttl(&self) -> Option<Duration> {
            self.ttl
        }

        async fn get_quote(&self, params: &OperationParams, _caller: &Address) -> Result<ProviderQuote> {
            self.record(MockCall::GetQuote);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.panic_on_quote {
                panic!("{} blew up while quoting", self.name);
            }
            if let Some(error) = self.quote_error.lock().clone() {
                return Err(error);
            }

            let from = self.resolve(params, intentroute_common::TokenSide::From)?;
            let to = self.resolve(params, intentroute_common::TokenSide::To)?;
            Ok(ProviderQuote::new(
                from,
                to,
                *self.from_amount.lock(),
                *self.to_amount.lock(),
            ))
        }

        async fn build_transaction(&self, quote: &Quote, _caller: &Address) -> Result<TxDescriptor> {
            self.record(MockCall::BuildTransaction {
                from_token: quote.from_token.address.clone(),
            });
            if self.fail_build.load(Ordering::SeqCst) {
                return Err(IntentError::provider(&self.name, "route no longer available"));
            }

            let tx = TxDescriptor::new(
                Address::new("0x10ed43c718714eb63d5aa57b78b54704e256024e"),
                format!("0xswap{}", quote.id.as_uuid().simple()),
                0,
            );
            Ok(match &self.spender {
                Some(spender) => tx.with_spender(spender.clone()),
                None => tx,
            })
        }

        async fn check_allowance(
            &self,
            _network: &NetworkId,
            _token: &Address,
            _owner: &Address,
            spender: &Address,
        ) -> Result<u128> {
            self.record(MockCall::CheckAllowance {
                spender: spender.clone(),
            });
            Ok(*self.allowance.lock())
        }

        async fn build_approve_transaction(
            &self,
            _network: &NetworkId,
            token: &Address,
            spender: &Address,
            amount: u128,
            _owner: &Address,
        ) -> Result<TxDescriptor> {
            self.record(MockCall::BuildApprove { amount });
            Ok(TxDescriptor::new(
                token.clone(),
                format!("0x095ea7b3{}{:064x}", spender.as_str().trim_start_matches("0x"), amount),
                0,
            ))
        }

        async fn check_balance(&self, _quote: &Quote, _caller: &Address) -> Result<BalanceCheck> {
            self.record(MockCall::CheckBalance);
            Ok(self.balance.lock().clone())
        }

        async fn invalidate_balance_cache(
            &self,
            token: &Address,
            _owner: &Address,
            _network: &NetworkId,
        ) -> Result<()> {
            self.record(MockCall::InvalidateBalanceCache {
                token: token.clone(),
            });
            if self.fail_invalidation.load(Ordering::SeqCst) {
                return Err(IntentError::provider(&self.name, "balance cache unavailable"));
            }
            Ok(())
        }

        async fn wrap_token(&self, amount: u128, wrapped_token: &Address) -> Result<TxDescriptor> {
            self.record(MockCall::WrapToken { amount });
            Ok(TxDescriptor::new(wrapped_token.clone(), "0xd0e30db0", amount))
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockCall, MockProvider};

#[cfg(test)]
mod tests {
    use super::*;
    use intentroute_common::{AmountType, TokenInfo};
    use rust_decimal_macros::dec;

    const USDT: &str = "0x55d398326f99059ff775485246999027b3197955";
    const CAKE: &str = "0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82";

    fn caller() -> Address {
        Address::new("0x00000000000000000000000000000000000000aa")
    }

    #[tokio::test]
    async fn test_mock_provider_quote() {
        let provider = MockProvider::new("test", vec![NetworkId::bnb()])
            .with_quote(dec!(10), dec!(4.2))
            .with_token(TokenInfo::new(Address::new(CAKE), 18, "CAKE"));
        let params =
            OperationParams::swap(NetworkId::bnb(), USDT, CAKE, "10", AmountType::Input).unwrap();

        let quote = provider.get_quote(&params, &caller()).await.unwrap();

        assert_eq!(quote.to_amount, dec!(4.2));
        assert_eq!(quote.to_token.symbol, "CAKE");
        assert_eq!(provider.calls(), vec![MockCall::GetQuote]);
    }

    #[tokio::test]
    async fn test_mock_provider_rejects_symbols() {
        let provider = MockProvider::new("test", vec![NetworkId::bnb()]);
        let params =
            OperationParams::swap(NetworkId::bnb(), "BINK", CAKE, "10", AmountType::Input).unwrap();

        let result = provider.get_quote(&params, &caller()).await;

        assert!(matches!(result, Err(IntentError::TokenNotFound { .. })));
    }

    #[tokio::test]
    async fn test_default_wrap_is_unsupported() {
        struct NoWrap;

        #[async_trait]
        impl Provider for NoWrap {
            fn name(&self) -> &str {
                "nowrap"
            }
            fn supported_networks(&self) -> Vec<NetworkId> {
                vec![]
            }
            async fn get_quote(&self, _: &OperationParams, _: &Address) -> Result<ProviderQuote> {
                Err(IntentError::Unsupported("quote".into()))
            }
            async fn build_transaction(&self, _: &Quote, _: &Address) -> Result<TxDescriptor> {
                Err(IntentError::Unsupported("build".into()))
            }
            async fn check_allowance(&self, _: &NetworkId, _: &Address, _: &Address, _: &Address) -> Result<u128> {
                Ok(0)
            }
            async fn build_approve_transaction(
                &self,
                _: &NetworkId,
                _: &Address,
                _: &Address,
                _: u128,
                _: &Address,
            ) -> Result<TxDescriptor> {
                Err(IntentError::Unsupported("approve".into()))
            }
            async fn check_balance(&self, _: &Quote, _: &Address) -> Result<BalanceCheck> {
                Ok(BalanceCheck::valid())
            }
            async fn invalidate_balance_cache(&self, _: &Address, _: &Address, _: &NetworkId) -> Result<()> {
                Ok(())
            }
        }

        let result = NoWrap.wrap_token(1, &Address::new(USDT)).await;
        assert!(matches!(result, Err(IntentError::Unsupported(_))));
    }
}
