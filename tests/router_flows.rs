// Orchestrator integration tests
// Drives the router end to end against in-process mock collaborators: a
// constant-product probe executor and a scripted market-maker quote service
//
// Numan Thabit 2025 Nov

use async_trait::async_trait;
use liquidity_router::config::{EngineConfig, QuoteOptions, RfqOptions, TokenAdjacencyGraph};
use liquidity_router::errors::AggrError;
use liquidity_router::market::{MarketMakerQuote, Side, StandingOrder};
use liquidity_router::router::{OrderFillData, Router};
use liquidity_router::sampler::{QuoteSampler, SamplerOp};
use liquidity_router::sources::{Source, SourceFilters};
use liquidity_router::venues::{
    PoolCache, ProbeExecutor, ProbeOutcome, QuoteProvider, QuoteRequest, SampleStrategy,
};
use num::{BigUint, ToPrimitive};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const C: &str = "0xcccccccccccccccccccccccccccccccccccccccc";
const D: &str = "0xdddddddddddddddddddddddddddddddddddddddd";
const M: &str = "0x1111111111111111111111111111111111111111";

/// Constant-product pools keyed by (source, taker token, maker token).
#[derive(Default)]
struct PoolExecutor {
    pools: BTreeMap<(Source, String, String), (u128, u128)>,
    fail: bool,
}

impl PoolExecutor {
    fn pool(mut self, source: Source, taker: &str, maker: &str, reserves: (u128, u128)) -> Self {
        self.pools
            .insert((source, taker.to_string(), maker.to_string()), reserves);
        self
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn answer(&self, op: &SamplerOp) -> ProbeOutcome {
        match op {
            SamplerOp::SellQuotes {
                source,
                taker_token,
                maker_token,
                amounts,
                ..
            } => {
                let (rt, rm) = *self.pools.get(&(*source, taker_token.clone(), maker_token.clone()))?;
                amounts
                    .iter()
                    .map(|x| {
                        let x = x.to_u128()?;
                        Some(BigUint::from(rm * x / (rt + x)))
                    })
                    .collect()
            }
            SamplerOp::BuyQuotes {
                source,
                taker_token,
                maker_token,
                amounts,
                ..
            } => {
                let (rt, rm) = *self.pools.get(&(*source, taker_token.clone(), maker_token.clone()))?;
                amounts
                    .iter()
                    .map(|y| {
                        let y = y.to_u128()?;
                        if y >= rm {
                            return None;
                        }
                        Some(BigUint::from((rt * y).div_ceil(rm - y)))
                    })
                    .collect()
            }
            SamplerOp::OrderFillable { orders } => {
                Some(orders.iter().map(|o| o.taker_amount.clone()).collect())
            }
        }
    }
}

#[async_trait]
impl ProbeExecutor for PoolExecutor {
    async fn execute(&self, ops: &[SamplerOp]) -> Result<Vec<ProbeOutcome>, AggrError> {
        if self.fail {
            return Err(AggrError::Transport("connection refused".to_string()));
        }
        Ok(ops.iter().map(|op| self.answer(op)).collect())
    }
}

#[derive(Default)]
struct ScriptedMaker {
    quotes: Vec<MarketMakerQuote>,
    /// Each request with whether it asked for firm quotes.
    requests: Mutex<Vec<(QuoteRequest, bool)>>,
}

#[async_trait]
impl QuoteProvider for ScriptedMaker {
    async fn request_indicative_quotes(
        &self,
        req: &QuoteRequest,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        self.requests.lock().unwrap().push((req.clone(), false));
        Ok(self.quotes.clone())
    }

    async fn request_firm_quotes(
        &self,
        req: &QuoteRequest,
        taker_address: Option<&str>,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        taker_address.ok_or(AggrError::InvalidFirmQuoteRequest)?;
        self.requests.lock().unwrap().push((req.clone(), true));
        Ok(self.quotes.clone())
    }
}

/// Off-chain cache that quotes a flat rate of 2 per input unit.
struct FlatCache {
    strategy: SampleStrategy,
}

#[async_trait]
impl PoolCache for FlatCache {
    async fn how_to_sample(&self, _taker: &str, _maker: &str, _allowed: bool) -> SampleStrategy {
        self.strategy
    }

    async fn quotes_off_chain(
        &self,
        _side: Side,
        _input_token: &str,
        _output_token: &str,
        amounts: &[BigUint],
    ) -> Result<Vec<BigUint>, AggrError> {
        Ok(amounts.iter().map(|a| a * 2u32).collect())
    }
}

fn engine() -> Arc<EngineConfig> {
    let sources = SourceFilters::from_sources([
        Source::UniswapV2,
        Source::Curve,
        Source::Native,
        Source::Rfq,
        Source::MultiHop,
    ]);
    let mut edges = BTreeMap::new();
    edges.insert(A.to_string(), vec![M.to_string()]);
    edges.insert(B.to_string(), vec![M.to_string()]);
    Arc::new(EngineConfig {
        token_adjacency: TokenAdjacencyGraph::new(edges, Vec::new()),
        sell_sources: sources.clone(),
        buy_sources: sources,
        ..EngineConfig::default()
    })
}

fn router(executor: PoolExecutor) -> Router {
    let engine = engine();
    let sampler = Arc::new(QuoteSampler::new(Arc::new(executor), Arc::clone(&engine)));
    Router::new(sampler, engine)
}

fn order(id: &str, maker_token: &str, taker_token: &str, maker: u64, taker: u64) -> StandingOrder {
    StandingOrder {
        id: id.to_string(),
        maker: M.to_string(),
        maker_token: maker_token.to_string(),
        taker_token: taker_token.to_string(),
        maker_amount: BigUint::from(maker),
        taker_amount: BigUint::from(taker),
        expiry: None,
    }
}

fn expired(id: &str, maker_token: &str, taker_token: &str) -> StandingOrder {
    StandingOrder {
        expiry: Some(1),
        ..order(id, maker_token, taker_token, 1, 1)
    }
}

fn u(v: u64) -> BigUint {
    BigUint::from(v)
}

#[tokio::test]
async fn sell_plan_splits_across_equal_pools() {
    let executor = PoolExecutor::default()
        .pool(Source::UniswapV2, A, B, (1_000_000, 1_000_000))
        .pool(Source::Curve, A, B, (1_000_000, 1_000_000));
    let router = router(executor);
    let outcome = router
        .get_market_sell_plan(&[expired("o", B, A)], &u(100_000), &QuoteOptions::default())
        .await
        .unwrap();
    let plan = outcome.plan;
    assert_eq!(plan.side, Side::Sell);
    assert!(!plan.is_two_hop);
    assert!(!plan.has_fallback());
    assert_eq!(plan.orders.len(), 2);
    assert_eq!(plan.source_flags, Source::UniswapV2.flag() | Source::Curve.flag());

    let (input, output) = plan.primary_amounts();
    assert_eq!(input, u(100_000));
    // a single pool would return 90_909
    assert!(output > u(90_909));
    for order in &plan.orders {
        assert_eq!(order.taker_token, A);
        assert_eq!(order.maker_token, B);
        assert!(order.output_bound < order.maker_amount);
    }
    assert!(outcome.report.is_none());
}

#[tokio::test]
async fn buy_plan_bounds_the_cost() {
    let executor = PoolExecutor::default().pool(Source::UniswapV2, A, B, (1_000_000, 1_000_000));
    let router = router(executor);
    let opts = QuoteOptions {
        should_generate_report: true,
        ..QuoteOptions::default()
    };
    let outcome = router
        .get_market_buy_plan(&[expired("o", B, A)], &u(10_000), &opts)
        .await
        .unwrap();
    let order = &outcome.plan.orders[0];
    assert_eq!(order.maker_amount, u(10_000));
    assert_eq!(order.taker_amount, u(10_102));
    assert_eq!(order.output_bound, u(10_153));
    let report = outcome.report.unwrap();
    assert_eq!(report.breakdown[0].source, Source::UniswapV2);
    assert_eq!(report.orders_fillable, 0);
}

#[tokio::test]
async fn off_chain_curve_replaces_on_chain_probe() {
    let engine = engine();
    let executor = PoolExecutor::default().pool(Source::Curve, A, B, (1_000_000, 1_000_000));
    let cache = Arc::new(FlatCache {
        strategy: SampleStrategy {
            on_chain: true,
            off_chain: true,
        },
    });
    let sampler = QuoteSampler::new(Arc::new(executor), Arc::clone(&engine))
        .with_pool_cache(Source::Curve, cache);
    let router = Router::new(Arc::new(sampler), engine);
    let liquidity = router
        .get_market_sell_liquidity(&[expired("o", B, A)], &u(1_000), &QuoteOptions::default())
        .await
        .unwrap();
    let curve = &liquidity.dex_quotes[&Source::Curve];
    let last = curve.last().unwrap();
    assert_eq!(last.input, u(1_000));
    assert_eq!(last.output, u(2_000));
}

#[tokio::test]
async fn empty_orders_are_rejected() {
    let router = router(PoolExecutor::default());
    let err = router
        .get_market_sell_plan(&[], &u(1), &QuoteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, AggrError::EmptyOrders);
    let err = router
        .get_market_buy_liquidity(&[], &u(1), &QuoteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, AggrError::EmptyOrders);
}

#[tokio::test]
async fn probe_failure_is_absorbed() {
    let router = router(PoolExecutor::failing());
    let liquidity = router
        .get_market_sell_liquidity(&[order("o", B, A, 10, 10)], &u(1_000), &QuoteOptions::default())
        .await
        .unwrap();
    assert!(liquidity.dex_quotes.values().all(|curve| curve.is_empty()));
    assert!(liquidity.orders.iter().all(|o| o.fillable_taker_amount == u(0)));

    let err = router
        .get_market_sell_plan(&[order("o", B, A, 10, 10)], &u(1_000), &QuoteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, AggrError::NoOptimalPath);
}

#[tokio::test]
async fn native_primary_gets_on_chain_fallback() {
    let executor = PoolExecutor::default().pool(Source::Curve, A, B, (1_000_000_000, 1_000_000_000));
    let router = router(executor);
    let outcome = router
        .get_market_sell_plan(
            &[order("o", B, A, 100_000, 100_000)],
            &u(100_000),
            &QuoteOptions::default(),
        )
        .await
        .unwrap();
    let plan = outcome.plan;
    let primary: Vec<_> = plan.primary_orders().collect();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].source, Source::Native);
    assert_eq!(primary[0].output_bound, u(100_000));
    assert!(plan.has_fallback());
    let fallback: Vec<_> = plan.orders.iter().filter(|o| o.is_fallback).collect();
    assert_eq!(fallback[0].source, Source::Curve);
    assert_eq!(fallback[0].taker_amount, u(100_000));

    let no_fallback = QuoteOptions {
        allow_fallback: false,
        ..QuoteOptions::default()
    };
    let plan = router
        .get_market_sell_plan(&[order("o", B, A, 100_000, 100_000)], &u(100_000), &no_fallback)
        .await
        .unwrap()
        .plan;
    assert!(!plan.has_fallback());
}

#[tokio::test]
async fn firm_quotes_without_taker_fail_fast() {
    let executor = PoolExecutor::default().pool(Source::Curve, A, B, (1_000_000, 1_000_000));
    let maker = Arc::new(ScriptedMaker::default());
    let router = router(executor).with_quote_provider(maker.clone());
    let opts = QuoteOptions {
        rfq: Some(RfqOptions {
            enabled: true,
            is_indicative: false,
            price_aware: true,
            ..RfqOptions::default()
        }),
        ..QuoteOptions::default()
    };
    let err = router
        .get_market_sell_plan(&[expired("o", B, A)], &u(1_000), &opts)
        .await
        .unwrap_err();
    assert_eq!(err, AggrError::InvalidFirmQuoteRequest);
    assert!(maker.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn quotes_alongside_sampling_are_indicative() {
    let executor = PoolExecutor::default().pool(Source::Curve, A, B, (1_000_000, 1_000_000));
    let maker = Arc::new(ScriptedMaker::default());
    let router = router(executor).with_quote_provider(maker.clone());
    let opts = QuoteOptions {
        rfq: Some(RfqOptions {
            enabled: true,
            is_indicative: false,
            ..RfqOptions::default()
        }),
        ..QuoteOptions::default()
    };
    let plan = router
        .get_market_sell_plan(&[expired("o", B, A)], &u(1_000), &opts)
        .await
        .unwrap()
        .plan;
    assert_eq!(plan.orders[0].source, Source::Curve);
    let requests = maker.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (req, firm) = &requests[0];
    assert!(!firm);
    assert!(req.comparison_price.is_none());
}

#[tokio::test]
async fn price_aware_quotes_trigger_second_pass() {
    let executor = PoolExecutor::default().pool(Source::Curve, A, B, (1_000_000_000, 1_000_000_000));
    let maker = Arc::new(ScriptedMaker {
        quotes: vec![MarketMakerQuote {
            id: "q1".to_string(),
            maker: M.to_string(),
            maker_token: B.to_string(),
            taker_token: A.to_string(),
            maker_amount: u(120_000),
            taker_amount: u(100_000),
            is_firm: false,
        }],
        ..ScriptedMaker::default()
    });
    let router = router(executor).with_quote_provider(maker.clone());
    let opts = QuoteOptions {
        rfq: Some(RfqOptions {
            enabled: true,
            is_indicative: true,
            price_aware: true,
            ..RfqOptions::default()
        }),
        ..QuoteOptions::default()
    };
    let plan = router
        .get_market_sell_plan(&[expired("o", B, A)], &u(100_000), &opts)
        .await
        .unwrap()
        .plan;
    let primary: Vec<_> = plan.primary_orders().collect();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].source, Source::Rfq);
    assert!(matches!(primary[0].fill_data, OrderFillData::Rfq { .. }));

    let requests = maker.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let price = requests[0].0.comparison_price.clone().unwrap();
    // first pass came from the curve alone
    assert!(price < num::BigRational::from_integer(1.into()));
}

#[tokio::test]
async fn two_hop_route_wins_whole() {
    let executor = PoolExecutor::default()
        .pool(Source::UniswapV2, A, B, (1_000_000, 1_000_000))
        .pool(Source::Curve, A, M, (1_000_000_000, 2_000_000_000))
        .pool(Source::Curve, M, B, (1_000_000_000, 1_000_000_000));
    let router = router(executor);
    let plan = router
        .get_market_sell_plan(&[expired("o", B, A)], &u(100_000), &QuoteOptions::default())
        .await
        .unwrap()
        .plan;
    assert!(plan.is_two_hop);
    assert_eq!(plan.orders.len(), 1);
    match &plan.orders[0].fill_data {
        OrderFillData::TwoHop {
            intermediate_token,
            first_source,
            second_source,
            ..
        } => {
            assert_eq!(intermediate_token, M);
            assert_eq!((*first_source, *second_source), (Source::Curve, Source::Curve));
        }
        other => panic!("expected a two-hop order, got {other:?}"),
    }
    assert!(plan.orders[0].maker_amount > u(190_000));
}

#[tokio::test]
async fn batch_buy_isolates_failing_items() {
    let executor = PoolExecutor::default().pool(Source::UniswapV2, A, B, (1_000_000, 1_000_000));
    let router = router(executor);
    let plans = router
        .get_batch_market_buy_plan(
            &[vec![expired("a", B, A)], vec![expired("c", D, C)], Vec::new()],
            &[u(10_000), u(10_000), u(10_000)],
            &QuoteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(plans.len(), 3);
    let first = plans[0].as_ref().unwrap();
    assert_eq!(first.orders[0].maker_amount, u(10_000));
    assert_eq!(first.orders[0].taker_amount, u(10_102));
    assert!(plans[1].is_none());
    assert!(plans[2].is_none());

    let err = router
        .get_batch_market_buy_plan(&[], &[], &QuoteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, AggrError::EmptyOrders);
}
