//! Router configuration.

use std::str::FromStr;

use chrono::Duration;
use intentroute_quote::{QuoteCacheConfig, QuoteEngineConfig};

/// How much allowance an approval grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalPolicy {
    /// Exactly the amount the pending transaction transfers.
    #[default]
    Exact,
    /// The maximum integer, so later operations skip approval.
    Unlimited,
}

impl ApprovalPolicy {
    /// Allowance to request for a transfer of `required` base units.
    pub fn amount_for(&self, required: u128) -> u128 {
        match self {
            ApprovalPolicy::Exact => required,
            ApprovalPolicy::Unlimited => u128::MAX,
        }
    }
}

impl FromStr for ApprovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ApprovalPolicy::Exact),
            "unlimited" | "max" => Ok(ApprovalPolicy::Unlimited),
            other => Err(format!("Unknown approval policy: {}", other)),
        }
    }
}

/// Transaction pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Allowance requested by approvals.
    pub approval_policy: ApprovalPolicy,
    /// Wrap a native source asset before executing a limit order.
    pub wrap_on_limit_orders: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            approval_policy: ApprovalPolicy::Exact,
            wrap_on_limit_orders: true,
        }
    }
}

/// Error recovery configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Retry once after resolving an unknown token symbol.
    pub enabled: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Main router configuration.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Quote engine configuration.
    pub quote: QuoteEngineConfig,
    /// Quote cache configuration.
    pub cache: QuoteCacheConfig,
    /// Pipeline configuration.
    pub pipeline: PipelineConfig,
    /// Recovery configuration.
    pub recovery: RecoveryConfig,
    /// Log level.
    pub log_level: Option<String>,
}

fn env_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl RouterConfig {
    /// Load configuration from `INTENTROUTE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("INTENTROUTE_QUOTE_TTL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.quote.default_ttl = Duration::seconds(secs);
            }
        }

        if let Ok(secs) = std::env::var("INTENTROUTE_MAX_QUOTE_TTL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.quote.max_ttl = Duration::seconds(secs);
            }
        }

        if let Ok(limit) = std::env::var("INTENTROUTE_MAX_CONCURRENT_QUOTES") {
            if let Ok(limit) = limit.parse() {
                config.quote.max_concurrent_quotes = Some(limit);
            }
        }

        if let Ok(entries) = std::env::var("INTENTROUTE_QUOTE_CACHE_MAX_ENTRIES") {
            if let Ok(entries) = entries.parse() {
                config.cache.max_entries = entries;
            }
        }

        if let Ok(secs) = std::env::var("INTENTROUTE_QUOTE_CACHE_SWEEP_SECS") {
            if let Ok(secs) = secs.parse() {
                config.cache.sweep_interval = Duration::seconds(secs);
            }
        }

        if let Ok(policy) = std::env::var("INTENTROUTE_APPROVAL_POLICY") {
            if let Ok(policy) = policy.parse() {
                config.pipeline.approval_policy = policy;
            }
        }

        if let Ok(wrap) = std::env::var("INTENTROUTE_WRAP_ON_LIMIT_ORDERS") {
            config.pipeline.wrap_on_limit_orders = env_flag(&wrap);
        }

        if let Ok(enabled) = std::env::var("INTENTROUTE_RECOVERY_ENABLED") {
            config.recovery.enabled = env_flag(&enabled);
        }

        if let Ok(level) = std::env::var("INTENTROUTE_LOG_LEVEL") {
            config.log_level = Some(level);
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.quote.default_ttl <= Duration::zero() {
            return Err("Default quote TTL must be positive".to_string());
        }

        if self.quote.default_ttl > self.quote.max_ttl {
            return Err("Default quote TTL cannot exceed max quote TTL".to_string());
        }

        if self.quote.max_concurrent_quotes == Some(0) {
            return Err("Max concurrent quotes cannot be 0".to_string());
        }

        if self.cache.max_entries == 0 {
            return Err("Quote cache must hold at least one entry".to_string());
        }

        if self.cache.sweep_interval <= Duration::zero() {
            return Err("Cache sweep interval must be positive".to_string());
        }

        Ok(())
    }
}
