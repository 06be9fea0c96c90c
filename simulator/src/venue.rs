//! Simulated venues.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::debug;

use intentroute_common::{
    constants, Address, AmountType, BalanceCheck, Clock, IntentError, NetworkId, OperationKind,
    OperationParams, ProviderQuote, Quote, Result, TokenInfo, TokenSide, TokenTable, TxDescriptor,
};
use intentroute_quote::{Provider, TtlCache};

/// ERC-20 `approve(address,uint256)` selector.
const APPROVE_SELECTOR: &str = "0x095ea7b3";
/// Wrapped-native `deposit()` selector.
const DEPOSIT_SELECTOR: &str = "0xd0e30db0";

/// How a simulated venue prices and behaves.
#[derive(Debug, Clone)]
pub struct VenueProfile {
    pub name: String,
    pub kind: OperationKind,
    pub networks: Vec<NetworkId>,
    /// Units of the destination token paid per unit of the source token.
    pub rate: Decimal,
    /// Worst-case price slip per quote, in basis points.
    pub jitter_bps: u32,
    /// Quote latency range in milliseconds.
    pub latency_ms: (u64, u64),
    /// Probability that a quote request fails.
    pub failure_rate: f64,
    /// Contract executing the trade.
    pub router: Address,
    /// Contract that pulls tokens from the caller, if any.
    pub spender: Option<Address>,
    pub quote_ttl: Option<Duration>,
    /// Allowance every owner starts with, in base units.
    pub starting_allowance: u128,
    /// Balance every owner holds of every token, in base units.
    pub balance: u128,
}

impl VenueProfile {
    /// A well-behaved swap venue on `networks`.
    pub fn new(name: impl Into<String>, networks: Vec<NetworkId>, rate: Decimal) -> Self {
        Self {
            name: name.into(),
            kind: OperationKind::Swap,
            networks,
            rate,
            jitter_bps: 0,
            latency_ms: (5, 25),
            failure_rate: 0.0,
            router: Address::new("0x10ed43c718714eb63d5aa57b78b54704e256024e"),
            spender: None,
            quote_ttl: None,
            starting_allowance: u128::MAX,
            balance: u128::MAX,
        }
    }

    pub fn with_jitter_bps(mut self, bps: u32) -> Self {
        self.jitter_bps = bps;
        self
    }

    pub fn with_latency_ms(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = (min.min(max), max.max(min));
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_spender(mut self, spender: Address, starting_allowance: u128) -> Self {
        self.spender = Some(spender);
        self.starting_allowance = starting_allowance;
        self
    }

}

type BalanceKey = (NetworkId, Address, Address);
type AllowanceKey = (NetworkId, Address, Address, Address);

/// A venue that prices from a fixed rate with random slip, latency and
/// failures.
///
/// Approvals take effect as soon as they are built.
pub struct SimulatedVenue {
    profile: VenueProfile,
    tokens: Arc<dyn TokenTable>,
    rng: Mutex<StdRng>,
    allowances: Mutex<HashMap<AllowanceKey, u128>>,
    balances: TtlCache<BalanceKey, u128>,
}

impl SimulatedVenue {
    /// Create a venue. A seed makes its randomness reproducible.
    pub fn new(
        profile: VenueProfile,
        tokens: Arc<dyn TokenTable>,
        clock: Arc<dyn Clock>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            profile,
            tokens,
            rng: Mutex::new(rng),
            allowances: Mutex::new(HashMap::new()),
            balances: TtlCache::new(clock, 1_024),
        }
    }

    fn token_info(&self, params: &OperationParams, side: TokenSide) -> Result<TokenInfo> {
        let reference = params.token(side);
        let network = params.network_for(side);
        let spec = network.require_spec()?;
        let not_found = || IntentError::TokenNotFound {
            reference: reference.clone(),
            network: network.clone(),
        };

        if !reference.is_address_for(spec.family) {
            return Err(not_found());
        }
        let address = reference.to_address();
        if spec.is_native(&address) {
            return Ok(TokenInfo::new(address, spec.native_decimals, spec.native_symbol));
        }

        let meta = self
            .tokens
            .lookup(network)
            .and_then(|directory| directory.get(&address))
            .ok_or_else(not_found)?;
        Ok(TokenInfo::new(address, meta.decimals, meta.symbol.clone()))
    }

    /// Draw a latency and decide whether this request fails.
    fn roll(&self) -> (StdDuration, bool, Decimal) {
        let mut rng = self.rng.lock();
        let (min, max) = self.profile.latency_ms;
        let latency = StdDuration::from_millis(rng.gen_range(min..=max));
        let fails = rng.gen_bool(self.profile.failure_rate.clamp(0.0, 1.0));
        let slip = Decimal::new(rng.gen_range(0..=self.profile.jitter_bps) as i64, 4);
        (latency, fails, slip)
    }

    fn price(
        &self,
        params: &OperationParams,
        from: &TokenInfo,
        to: &TokenInfo,
        slip: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        let rate = self.profile.rate;
        let overflow = || IntentError::InvalidAmount(format!("{} overflows the venue price", params.amount));

        match params.amount_type {
            AmountType::Input => {
                let received = params
                    .amount
                    .checked_mul(rate)
                    .and_then(|v| v.checked_mul(Decimal::ONE - slip))
                    .ok_or_else(overflow)?;
                Ok((params.amount, received.round_dp(to.decimals)))
            }
            AmountType::Output => {
                let spent = params
                    .amount
                    .checked_div(rate)
                    .and_then(|v| v.checked_mul(Decimal::ONE + slip))
                    .ok_or_else(overflow)?;
                Ok((spent.round_dp(from.decimals), params.amount))
            }
        }
    }
}

#[async_trait]
impl Provider for SimulatedVenue {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn kind(&self) -> OperationKind {
        self.profile.kind
    }

    fn supported_networks(&self) -> Vec<NetworkId> {
        self.profile.networks.clone()
    }

    fn quote_ttl(&self) -> Option<Duration> {
        self.profile.quote_ttl
    }

    async fn get_quote(&self, params: &OperationParams, _caller: &Address) -> Result<ProviderQuote> {
        let (latency, fails, slip) = self.roll();
        tokio::time::sleep(latency).await;
        if fails {
            return Err(IntentError::provider(&self.profile.name, "simulated upstream failure"));
        }

        let from = self.token_info(params, TokenSide::From)?;
        let to = self.token_info(params, TokenSide::To)?;
        let (from_amount, to_amount) = self.price(params, &from, &to, slip)?;

        debug!(
            venue = %self.profile.name,
            latency_ms = latency.as_millis() as u64,
            %from_amount,
            %to_amount,
            "Priced quote"
        );
        Ok(ProviderQuote::new(from, to, from_amount, to_amount)
            .with_estimated_gas(150_000)
            .with_price_impact(slip * Decimal::ONE_HUNDRED))
    }

    async fn build_transaction(&self, quote: &Quote, _caller: &Address) -> Result<TxDescriptor> {
        let spec = quote.network.require_spec()?;
        let value = if spec.is_native(&quote.from_token.address) {
            quote.required_amount()?
        } else {
            0
        };

        let tx = TxDescriptor::new(
            self.profile.router.clone(),
            format!("0x{}", quote.id.as_uuid().simple()),
            value,
        );
        Ok(match &self.profile.spender {
            Some(spender) => tx.with_spender(spender.clone()),
            None => tx,
        })
    }

    async fn check_allowance(
        &self,
        network: &NetworkId,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> Result<u128> {
        let key = (network.clone(), token.clone(), owner.clone(), spender.clone());
        Ok(self
            .allowances
            .lock()
            .get(&key)
            .copied()
            .unwrap_or(self.profile.starting_allowance))
    }

    async fn build_approve_transaction(
        &self,
        network: &NetworkId,
        token: &Address,
        spender: &Address,
        amount: u128,
        owner: &Address,
    ) -> Result<TxDescriptor> {
        let key = (network.clone(), token.clone(), owner.clone(), spender.clone());
        self.allowances.lock().insert(key, amount);

        let data = format!(
            "{}{:0>64}{:064x}",
            APPROVE_SELECTOR,
            spender.as_str().trim_start_matches("0x"),
            amount
        );
        Ok(TxDescriptor::new(token.clone(), data, 0))
    }

    async fn check_balance(&self, quote: &Quote, caller: &Address) -> Result<BalanceCheck> {
        let key = (
            quote.network.clone(),
            quote.from_token.address.clone(),
            caller.clone(),
        );
        let balance = match self.balances.get(&key) {
            Some(balance) => balance,
            None => {
                self.balances
                    .insert_with_ttl(key, self.profile.balance, constants::balance_cache_ttl());
                self.profile.balance
            }
        };

        let required = quote.required_amount()?;
        if balance >= required {
            Ok(BalanceCheck::valid())
        } else {
            Ok(BalanceCheck::invalid(format!(
                "{} holds {} base units of {}, needs {}",
                caller, balance, quote.from_token.symbol, required
            )))
        }
    }

    async fn invalidate_balance_cache(
        &self,
        token: &Address,
        owner: &Address,
        network: &NetworkId,
    ) -> Result<()> {
        self.balances
            .remove(&(network.clone(), token.clone(), owner.clone()));
        Ok(())
    }

    async fn wrap_token(&self, amount: u128, wrapped_token: &Address) -> Result<TxDescriptor> {
        Ok(TxDescriptor::new(wrapped_token.clone(), DEPOSIT_SELECTOR, amount))
    }
}
