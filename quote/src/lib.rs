//! IntentRoute Quote Engine
//!
//! Finds the best priced proposal for an operation across every registered
//! backend venue.
//!
//! # Features
//!
//! - Pluggable providers behind a single capability trait
//! - Registry of providers indexed by the networks they support
//! - Concurrent quote fanout that tolerates individual provider failures
//! - Time-bounded quote cache with lazy expiry
//!
//! # Example
//!
//! ```rust,ignore
//! use intentroute_quote::{ProviderRegistry, QuoteCache, QuoteEngine, QuoteEngineConfig};
//! use intentroute_common::{AmountType, NetworkId, OperationParams, SystemClock};
//!
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register(Arc::new(PancakeSwap::new()))?;
//!
//! let clock = Arc::new(SystemClock);
//! let cache = Arc::new(QuoteCache::new(clock.clone()));
//! let engine = QuoteEngine::new(registry, cache, clock, QuoteEngineConfig::default());
//!
//! let params = OperationParams::swap(NetworkId::bnb(), usdt, bink, "100", AmountType::Input)?;
//! let best = engine.get_best_quote(&params, &wallet_address).await?;
//! ```

pub mod cache;
pub mod engine;
pub mod provider;
pub mod registry;

pub use cache::{CacheStats, QuoteCache, QuoteCacheConfig, TtlCache};
pub use engine::{BestQuote, QuoteEngine, QuoteEngineConfig};
pub use provider::Provider;
pub use registry::ProviderRegistry;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::{MockCall, MockProvider};
