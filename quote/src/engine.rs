//! Best-quote selection across providers.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Duration;
use futures::{FutureExt, StreamExt};
use intentroute_common::{
    constants, Address, AmountType, Clock, IntentError, OperationParams, ProviderFailure,
    ProviderQuote, Quote, Result,
};
use tracing::{debug, info, instrument, warn};

use crate::cache::QuoteCache;
use crate::provider::Provider;
use crate::registry::ProviderRegistry;

/// Configuration for the quote engine.
#[derive(Debug, Clone)]
pub struct QuoteEngineConfig {
    /// Validity of issued quotes when the provider declares none.
    pub default_ttl: Duration,
    /// Upper bound on any validity a provider declares.
    pub max_ttl: Duration,
    /// Cap on in-flight provider calls. `None` asks every provider at once.
    pub max_concurrent_quotes: Option<usize>,
}

impl Default for QuoteEngineConfig {
    fn default() -> Self {
        Self {
            default_ttl: constants::default_quote_ttl(),
            max_ttl: constants::max_quote_ttl(),
            max_concurrent_quotes: None,
        }
    }
}

/// The winning quote and the provider that issued it.
#[derive(Clone)]
pub struct BestQuote {
    pub provider: Arc<dyn Provider>,
    pub quote: Quote,
    /// Providers that failed to quote, for diagnostics.
    pub failures: Vec<ProviderFailure>,
}

impl fmt::Debug for BestQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestQuote")
            .field("provider", &self.provider.name())
            .field("quote", &self.quote)
            .field("failures", &self.failures)
            .finish()
    }
}

struct Candidate {
    provider: Arc<dyn Provider>,
    proposal: ProviderQuote,
    score: u128,
}

/// Fans quote requests out to every eligible provider and keeps the best.
pub struct QuoteEngine {
    registry: Arc<ProviderRegistry>,
    cache: Arc<QuoteCache>,
    clock: Arc<dyn Clock>,
    config: QuoteEngineConfig,
}

impl QuoteEngine {
    /// Create a new quote engine.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<QuoteCache>,
        clock: Arc<dyn Clock>,
        config: QuoteEngineConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            clock,
            config,
        }
    }

    /// Get the registry this engine queries.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Get the cache issued quotes are stored in.
    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    /// Ask every eligible provider for a quote and return the best one.
    ///
    /// A failing (or panicking) provider is recorded and skipped. The call
    /// only fails when no provider produced a usable quote.
    #[instrument(skip(self, params, caller), fields(
        kind = %params.kind,
        network = %params.network,
        amount = %params.amount,
    ))]
    pub async fn get_best_quote(
        &self,
        params: &OperationParams,
        caller: &Address,
    ) -> Result<BestQuote> {
        params.network.require_spec()?;

        let providers = self
            .registry
            .providers_for_kind(params.kind, &params.network);
        if providers.is_empty() {
            return Err(IntentError::NoProvidersForNetwork(params.network.clone()));
        }

        let limit = self
            .config
            .max_concurrent_quotes
            .unwrap_or(providers.len())
            .max(1);
        debug!(providers = providers.len(), limit, "Requesting quotes");

        // `buffered` yields results in registration order regardless of
        // completion order, which keeps selection deterministic.
        let outcomes: Vec<(Arc<dyn Provider>, Result<ProviderQuote>)> =
            futures::stream::iter(providers)
                .map(|provider| async move {
                    let outcome = AssertUnwindSafe(provider.get_quote(params, caller))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Err(IntentError::provider(provider.name(), "panicked while quoting"))
                        });
                    (provider, outcome)
                })
                .buffered(limit)
                .collect()
                .await;

        let mut best: Option<Candidate> = None;
        let mut failures = Vec::new();

        for (provider, outcome) in outcomes {
            let scored = outcome.and_then(|proposal| {
                let score = score(&proposal, params.amount_type)?;
                Ok((proposal, score))
            });

            match scored {
                Ok((proposal, score)) => {
                    debug!(provider = provider.name(), score, "Quote received");
                    let replace = match &best {
                        Some(incumbent) => is_better(params.amount_type, score, incumbent.score),
                        None => true,
                    };
                    if replace {
                        best = Some(Candidate {
                            provider,
                            proposal,
                            score,
                        });
                    }
                }
                Err(error) => {
                    warn!(provider = provider.name(), error = %error, "Provider failed to quote");
                    failures.push(ProviderFailure::new(provider.name(), error));
                }
            }
        }

        let Some(winner) = best else {
            return Err(IntentError::NoQuoteAvailable {
                network: params.network.clone(),
                failures,
            });
        };

        let ttl = self.ttl_for(&winner);
        let quote = Quote::issue(
            winner.proposal,
            winner.provider.name(),
            params.clone(),
            caller.clone(),
            self.clock.now(),
            ttl,
        );
        self.cache.put(quote.clone());

        info!(
            quote_id = %quote.id,
            provider = %quote.provider,
            from_amount = %quote.from_amount,
            to_amount = %quote.to_amount,
            expires_at = %quote.expires_at,
            failed_providers = failures.len(),
            "Selected best quote"
        );

        Ok(BestQuote {
            provider: winner.provider,
            quote,
            failures,
        })
    }

    fn ttl_for(&self, candidate: &Candidate) -> Duration {
        let declared = candidate
            .proposal
            .ttl
            .or_else(|| candidate.provider.quote_ttl())
            .filter(|ttl| *ttl > Duration::zero());
        declared
            .unwrap_or(self.config.default_ttl)
            .min(self.config.max_ttl)
    }
}

/// Magnitude the comparator works on, in integer base units.
///
/// Input-fixed operations rank by what is received, output-fixed ones by
/// what is spent.
fn score(proposal: &ProviderQuote, amount_type: AmountType) -> Result<u128> {
    match amount_type {
        AmountType::Input => {
            intentroute_common::to_base_units(proposal.to_amount, proposal.to_token.decimals)
        }
        AmountType::Output => {
            intentroute_common::to_base_units(proposal.from_amount, proposal.from_token.decimals)
        }
    }
}

/// Strictly better only; ties keep the incumbent.
fn is_better(amount_type: AmountType, challenger: u128, incumbent: u128) -> bool {
    match amount_type {
        AmountType::Input => challenger > incumbent,
        AmountType::Output => challenger < incumbent,
    }
}
