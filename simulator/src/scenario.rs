//! Named simulation scenarios.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use intentroute_common::{
    Address, AmountType, ManualClock, NetworkId, OperationParams, OperationResult, StaticTokenTable,
    TokenTable,
};
use intentroute_executor::{IntentRouter, MetricsSnapshot, RouterConfig};
use intentroute_wallet::{InMemoryWallet, WalletConfig, WalletEvent};

use crate::venue::{SimulatedVenue, VenueProfile};

const USDT: &str = "0x55d398326f99059ff775485246999027b3197955";
const CAKE: &str = "0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82";
const NATIVE: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
const WBNB: &str = "0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c";
const SPENDER: &str = "0x13f4ea83d0bd40e75c8222255bc855a974568dd4";
const OWNER: &str = "0x8894e0a0c962cb723c1976a4421c95949be2d4e3";

/// A simulation scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    BestPrice,
    PartialFailure,
    Approval,
    SelfHeal,
    Expiry,
    LimitWrap,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::BestPrice,
        Scenario::PartialFailure,
        Scenario::Approval,
        Scenario::SelfHeal,
        Scenario::Expiry,
        Scenario::LimitWrap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::BestPrice => "best-price",
            Scenario::PartialFailure => "partial-failure",
            Scenario::Approval => "approval",
            Scenario::SelfHeal => "self-heal",
            Scenario::Expiry => "expiry",
            Scenario::LimitWrap => "limit-wrap",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::BestPrice => "Three venues quote a swap; the best output wins",
            Scenario::PartialFailure => "Two of four venues fail; the swap still executes",
            Scenario::Approval => "Zero allowance forces a confirmed approval before the swap",
            Scenario::SelfHeal => "A ticker symbol is resolved to its address and retried once",
            Scenario::Expiry => "A quote executed after its validity window is rejected",
            Scenario::LimitWrap => "A limit order paying the native asset wraps it first",
        }
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| anyhow!("Unknown scenario: {}", s))
    }
}

/// What one scenario run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub description: &'static str,
    pub passed: bool,
    /// Expectations the run violated.
    pub problems: Vec<String>,
    pub latency_ms: u64,
    pub result: OperationResult,
    pub metrics: MetricsSnapshot,
}

struct World {
    router: IntentRouter,
    wallet: Arc<InMemoryWallet>,
    clock: Arc<ManualClock>,
}

/// Builds a fresh router, wallet and set of venues for every scenario.
pub struct Simulation {
    seed: Option<u64>,
    router_config: RouterConfig,
    wallet_config: WalletConfig,
    tokens: Arc<dyn TokenTable>,
}

impl Simulation {
    pub fn new(seed: Option<u64>, router_config: RouterConfig, wallet_config: WalletConfig) -> Self {
        Self {
            seed,
            router_config,
            wallet_config,
            tokens: Arc::new(StaticTokenTable::builtin()),
        }
    }

    /// Use a different token table.
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenTable>) -> Self {
        self.tokens = tokens;
        self
    }

    fn world(&self, venues: Vec<VenueProfile>) -> anyhow::Result<World> {
        let clock = Arc::new(ManualClock::starting_now());
        let wallet = Arc::new(InMemoryWallet::with_config(
            Address::new(OWNER),
            self.wallet_config.clone(),
        ));
        let router = IntentRouter::new(
            self.router_config.clone(),
            wallet.clone(),
            self.tokens.clone(),
            clock.clone(),
        );

        for (i, profile) in venues.into_iter().enumerate() {
            let seed = self.seed.map(|s| s.wrapping_add(i as u64));
            let venue = SimulatedVenue::new(profile, self.tokens.clone(), clock.clone(), seed);
            router
                .register_provider(Arc::new(venue))
                .context("registering simulated venue")?;
        }

        Ok(World {
            router,
            wallet,
            clock,
        })
    }

    /// Run one scenario.
    pub async fn run(&self, scenario: Scenario) -> anyhow::Result<ScenarioReport> {
        info!(scenario = scenario.name(), "Running scenario");
        let started = Instant::now();

        let (world, result, problems) = match scenario {
            Scenario::BestPrice => self.best_price().await?,
            Scenario::PartialFailure => self.partial_failure().await?,
            Scenario::Approval => self.approval().await?,
            Scenario::SelfHeal => self.self_heal().await?,
            Scenario::Expiry => self.expiry().await?,
            Scenario::LimitWrap => self.limit_wrap().await?,
        };

        let report = ScenarioReport {
            scenario: scenario.name(),
            description: scenario.description(),
            passed: problems.is_empty(),
            problems,
            latency_ms: started.elapsed().as_millis() as u64,
            result,
            metrics: world.router.metrics().snapshot(),
        };
        info!(
            scenario = report.scenario,
            passed = report.passed,
            latency_ms = report.latency_ms,
            "Scenario finished"
        );
        Ok(report)
    }

    async fn best_price(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![
            venue("pancakeswap", "0.49").with_jitter_bps(10),
            venue("biswap", "0.50").with_jitter_bps(10),
            venue("apeswap", "0.48").with_jitter_bps(10),
        ])?;

        let result = world.router.swap(swap(USDT, CAKE, "100")?).await;

        let mut problems = Vec::new();
        expect_success(&mut problems, &result, Some("biswap"));
        Ok((world, result, problems))
    }

    async fn partial_failure(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![
            venue("pancakeswap", "0.49").with_failure_rate(1.0),
            venue("biswap", "0.48").with_latency_ms(100, 200),
            venue("apeswap", "0.50").with_failure_rate(1.0),
            venue("thena", "0.47"),
        ])?;

        let result = world.router.swap(swap(USDT, CAKE, "100")?).await;

        let mut problems = Vec::new();
        expect_success(&mut problems, &result, Some("biswap"));
        let failures = world.router.metrics().snapshot().provider_quote_failures;
        check(&mut problems, failures == 2, format!("expected 2 discarded quotes, saw {failures}"));
        Ok((world, result, problems))
    }

    async fn approval(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![
            venue("pancakeswap", "0.49").with_spender(Address::new(SPENDER), 0)
        ])?;

        let result = world.router.swap(swap(USDT, CAKE, "100")?).await;

        let mut problems = Vec::new();
        expect_success(&mut problems, &result, Some("pancakeswap"));
        check(&mut problems, result.approval_hash.is_some(), "no approval was issued");

        let sent = world.wallet.sent();
        let approval_first = sent.first().map(|tx| tx.tx.to == Address::new(USDT)).unwrap_or(false);
        check(&mut problems, approval_first, "approval was not the first transaction");
        let confirmed_before_swap = match world.wallet.events().as_slice() {
            [WalletEvent::Sent(a), WalletEvent::Confirmed(b), WalletEvent::Sent(_), ..] => a == b,
            _ => false,
        };
        check(
            &mut problems,
            confirmed_before_swap,
            "swap was submitted before the approval confirmed",
        );
        Ok((world, result, problems))
    }

    async fn self_heal(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![venue("pancakeswap", "0.02")])?;

        let result = world.router.swap(swap("BINK", USDT, "1000")?).await;

        let mut problems = Vec::new();
        expect_success(&mut problems, &result, Some("pancakeswap"));
        let retries = world.router.metrics().snapshot().recovery_retries;
        check(&mut problems, retries == 1, format!("expected 1 retry, saw {retries}"));
        Ok((world, result, problems))
    }

    async fn expiry(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![venue("pancakeswap", "0.49")])?;

        let best = world
            .router
            .get_quote(&swap(USDT, CAKE, "100")?)
            .await
            .context("quoting before expiry")?;
        world.clock.advance(Duration::minutes(6));
        let result = world.router.execute_quote(&best.quote).await;

        let mut problems = Vec::new();
        expect_failure(&mut problems, &result, "QUOTE_EXPIRED_OR_INVALID");
        check(
            &mut problems,
            world.wallet.sent().is_empty(),
            "a transaction was sent for an expired quote",
        );
        Ok((world, result, problems))
    }

    async fn limit_wrap(&self) -> anyhow::Result<(World, OperationResult, Vec<String>)> {
        let world = self.world(vec![venue("pancakeswap", "240")])?;

        let params = swap(NATIVE, CAKE, "1")?.with_limit_price(Decimal::from(250));
        let result = world.router.swap(params).await;

        let mut problems = Vec::new();
        expect_success(&mut problems, &result, Some("pancakeswap"));
        check(&mut problems, result.wrap_hash.is_some(), "native asset was not wrapped");
        let wrapped_first = world
            .wallet
            .sent()
            .first()
            .map(|tx| tx.tx.to == Address::new(WBNB))
            .unwrap_or(false);
        check(&mut problems, wrapped_first, "wrap was not the first transaction");
        Ok((world, result, problems))
    }
}

fn venue(name: &str, rate: &str) -> VenueProfile {
    let rate = Decimal::from_str(rate).unwrap_or(Decimal::ONE);
    VenueProfile::new(name, vec![NetworkId::bnb()], rate)
}

fn swap(from: &str, to: &str, amount: &str) -> anyhow::Result<OperationParams> {
    OperationParams::swap(NetworkId::bnb(), from, to, amount, AmountType::Input)
        .context("building swap parameters")
}

fn check(problems: &mut Vec<String>, ok: bool, problem: impl Into<String>) {
    if !ok {
        problems.push(problem.into());
    }
}

fn expect_success(problems: &mut Vec<String>, result: &OperationResult, provider: Option<&str>) {
    if !result.is_success() {
        problems.push(format!(
            "operation failed: {}",
            result.message.as_deref().unwrap_or("no message")
        ));
        return;
    }
    if let Some(expected) = provider {
        let actual = result.provider.as_deref().unwrap_or("none");
        check(
            problems,
            actual == expected,
            format!("expected provider {expected}, got {actual}"),
        );
    }
}

fn expect_failure(problems: &mut Vec<String>, result: &OperationResult, code: &str) {
    let actual = result.error_code.as_deref().unwrap_or("none");
    check(problems, actual == code, format!("expected error {code}, got {actual}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation() -> Simulation {
        Simulation::new(Some(42), RouterConfig::default(), WalletConfig::default())
    }

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("mainnet-fork".parse::<Scenario>().is_err());
    }

    #[tokio::test]
    async fn test_every_scenario_passes() {
        let simulation = simulation();

        for scenario in Scenario::ALL {
            let report = simulation.run(scenario).await.unwrap();
            assert!(report.passed, "{}: {:?}", report.scenario, report.problems);
        }
    }

    #[tokio::test]
    async fn test_report_serializes_result_record() {
        let report = simulation().run(Scenario::Expiry).await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scenario"], "expiry");
        assert_eq!(json["result"]["status"], "error");
        assert_eq!(json["result"]["errorCode"], "QUOTE_EXPIRED_OR_INVALID");
    }
}
