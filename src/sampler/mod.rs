// Quote sampler
// This file gathers sampled quote curves, standing-order remainders, spot
// conversion rates and two-hop candidates for one request, fanning the
// independent probes out concurrently and absorbing any single source's failure
//
// Numan Thabit 2025 Nov

pub mod ops;

pub use ops::SamplerOp;

use crate::config::EngineConfig;
use crate::errors::AggrError;
use crate::market::{
    DexSample, FillableOrder, MarketSideLiquidity, Side, StandingOrder, Token, TwoHopSample,
};
use crate::metrics::SOURCE_PROBE_FAILURES;
use crate::quant::{median_rate, ratio, sample_amounts};
use crate::sources::{Source, SourceFilters};
use crate::venues::adapter::{PoolCache, ProbeExecutor, ProbeOutcome};
use futures::future::join_all;
use num::{BigRational, BigUint, One, Zero};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Inputs of one market-side sampling round.
#[derive(Debug, Clone)]
pub struct SampleRequest<'a> {
    pub side: Side,
    pub orders: &'a [StandingOrder],
    pub input_token: &'a str,
    pub output_token: &'a str,
    pub amount: &'a BigUint,
    pub sources: &'a SourceFilters,
    pub fee_sources: &'a SourceFilters,
    pub num_samples: usize,
    pub sample_distribution_base_bps: u32,
}

/// One item of a batched buy sampling round.
#[derive(Debug, Clone)]
pub struct BatchBuyItem<'a> {
    pub orders: &'a [StandingOrder],
    pub maker_token: &'a str,
    pub taker_token: &'a str,
    pub amount: &'a BigUint,
}

/// Where each op of a batched item landed in the flattened outcome list.
#[derive(Debug, Default)]
struct ItemLayout {
    fillable: bool,
    ladder: Vec<Source>,
    spot_input: Vec<Source>,
    spot_output: Vec<Source>,
}

impl ItemLayout {
    fn len(&self) -> usize {
        usize::from(self.fillable) + self.ladder.len() + self.spot_input.len() + self.spot_output.len()
    }
}

pub struct QuoteSampler {
    executor: Arc<dyn ProbeExecutor>,
    pool_caches: BTreeMap<Source, Arc<dyn PoolCache>>,
    engine: Arc<EngineConfig>,
}

impl QuoteSampler {
    pub fn new(executor: Arc<dyn ProbeExecutor>, engine: Arc<EngineConfig>) -> Self {
        Self {
            executor,
            pool_caches: BTreeMap::new(),
            engine,
        }
    }

    /// Route `source` through an external pool cache.
    pub fn with_pool_cache(mut self, source: Source, cache: Arc<dyn PoolCache>) -> Self {
        self.pool_caches.insert(source, cache);
        self
    }

    /// Build the full liquidity snapshot for one request.
    #[tracing::instrument(skip_all, fields(side = req.side.as_str(), amount = %req.amount))]
    pub async fn sample_market_side(&self, req: &SampleRequest<'_>) -> MarketSideLiquidity {
        let amounts = sample_amounts(req.amount, req.num_samples, req.sample_distribution_base_bps);
        let settlement = self.engine.settlement_token.as_str();
        let sampled = req.sources.sampled_sources();
        let fee_sources = req.fee_sources.sampled_sources();
        let hop_sources: Vec<Source> = if req.sources.is_allowed(Source::MultiHop) {
            sampled.clone()
        } else {
            Vec::new()
        };
        let orders: &[StandingOrder] = if req.sources.is_allowed(Source::Native) {
            req.orders
        } else {
            &[]
        };

        let (orders, dex_quotes, eth_to_input_rate, eth_to_output_rate, two_hop_quotes) = tokio::join!(
            self.sample_fillable(orders),
            self.sample_ladder(&sampled, req.side, req.input_token, req.output_token, &amounts),
            self.sample_spot_rate(&fee_sources, settlement, req.input_token),
            self.sample_spot_rate(&fee_sources, settlement, req.output_token),
            self.sample_two_hop(&hop_sources, req.side, req.input_token, req.output_token, req.amount),
        );

        debug!(
            curves = dex_quotes.len(),
            orders = orders.len(),
            two_hop = two_hop_quotes.len(),
            "sampled market side"
        );

        MarketSideLiquidity {
            side: req.side,
            input_amount: req.amount.clone(),
            input_token: req.input_token.to_string(),
            output_token: req.output_token.to_string(),
            eth_to_input_rate,
            eth_to_output_rate,
            orders,
            dex_quotes,
            two_hop_quotes,
            rfq_quotes: Vec::new(),
            quote_source_filters: req.sources.clone(),
        }
    }

    /// One curve per sampled source over the ladder `amounts`.
    ///
    /// A source whose probe fails contributes an empty curve.
    pub async fn sample_ladder(
        &self,
        sources: &[Source],
        side: Side,
        input_token: &str,
        output_token: &str,
        amounts: &[BigUint],
    ) -> BTreeMap<Source, Vec<DexSample>> {
        let mut curves = BTreeMap::new();
        if amounts.is_empty() {
            return curves;
        }

        let (taker_token, maker_token) = side.taker_maker(input_token, output_token);
        let mut on_chain = Vec::new();
        let mut off_chain = Vec::new();
        for &source in sources.iter().filter(|s| s.is_sampled()) {
            match self.pool_caches.get(&source) {
                Some(cache) => {
                    let strategy = cache.how_to_sample(taker_token, maker_token, true).await;
                    if strategy.on_chain {
                        on_chain.push(source);
                    }
                    if strategy.off_chain {
                        off_chain.push((source, Arc::clone(cache)));
                    }
                }
                None => on_chain.push(source),
            }
        }

        let ops = quote_ops(&on_chain, side, input_token, output_token, amounts);
        let off_chain_quotes = off_chain.iter().map(|(source, cache)| async move {
            let res = tokio::time::timeout(
                self.engine.probe_timeout,
                cache.quotes_off_chain(side, input_token, output_token, amounts),
            )
            .await;
            let outcome = match res {
                Ok(Ok(outputs)) if outputs.len() == amounts.len() => Some(outputs),
                Ok(Ok(outputs)) => {
                    absorb(*source, format!("expected {} quotes, got {}", amounts.len(), outputs.len()));
                    None
                }
                Ok(Err(err)) => {
                    absorb(*source, err.to_string());
                    None
                }
                Err(_) => {
                    absorb(*source, "off-chain quote timed out".to_string());
                    None
                }
            };
            (*source, outcome)
        });

        let (on_chain_outcomes, off_chain_outcomes) =
            tokio::join!(self.probe(&ops), join_all(off_chain_quotes));

        for (op, outcome) in ops.iter().zip(on_chain_outcomes) {
            curves.insert(op.source(), to_curve(op.source(), amounts, outcome));
        }
        for (source, outcome) in off_chain_outcomes {
            let curve = to_curve(source, amounts, outcome);
            // an off-chain curve replaces the on-chain one when it produced anything
            if !curve.is_empty() || !curves.contains_key(&source) {
                curves.insert(source, curve);
            }
        }
        curves
    }

    /// Median output-per-input rate of selling `base` for `quote` across `sources`.
    ///
    /// Zero when every source fails; callers treat that as "gas cost unknown".
    pub async fn sample_spot_rate(&self, sources: &[Source], base: &str, quote: &str) -> BigRational {
        if base == quote {
            return BigRational::one();
        }
        let amount = [self.engine.spot_sample_amount.clone()];
        let curves = self.sample_ladder(sources, Side::Sell, base, quote, &amount).await;
        median_rate(spot_rates(curves.values().filter_map(|c| c.first())))
    }

    /// Best route through each intermediate token adjacent to both sides of the pair.
    pub async fn sample_two_hop(
        &self,
        sources: &[Source],
        side: Side,
        input_token: &str,
        output_token: &str,
        amount: &BigUint,
    ) -> Vec<TwoHopSample> {
        let hop_sources: Vec<Source> = sources.iter().copied().filter(|s| s.supports_hop()).collect();
        if hop_sources.is_empty() || amount.is_zero() {
            return Vec::new();
        }
        let intermediates = self
            .engine
            .token_adjacency
            .intermediaries(input_token, output_token);
        let routes = intermediates.iter().map(|mid| {
            self.sample_route_via(&hop_sources, side, input_token, mid, output_token, amount)
        });
        join_all(routes).await.into_iter().flatten().collect()
    }

    async fn sample_route_via(
        &self,
        sources: &[Source],
        side: Side,
        input_token: &str,
        intermediate: &Token,
        output_token: &str,
        amount: &BigUint,
    ) -> Option<TwoHopSample> {
        let first = self
            .sample_ladder(sources, side, input_token, intermediate, &[amount.clone()])
            .await;
        let (input_leg, intermediate_amount) = best_point(side, &first)?;
        let second = self
            .sample_ladder(sources, side, intermediate, output_token, &[intermediate_amount.clone()])
            .await;
        let (output_leg, output) = best_point(side, &second)?;

        // legs in execution order: taker token is always spent first
        let (first_source, second_source) = match side {
            Side::Sell => (input_leg, output_leg),
            Side::Buy => (output_leg, input_leg),
        };
        Some(TwoHopSample {
            intermediate_token: intermediate.clone(),
            first_source,
            second_source,
            input: amount.clone(),
            intermediate_amount,
            output,
        })
    }

    /// Pair each standing order with its fillable taker remainder.
    ///
    /// Expired orders and orders whose probe fails are treated as unfillable.
    pub async fn sample_fillable(&self, orders: &[StandingOrder]) -> Vec<FillableOrder> {
        if orders.is_empty() {
            return Vec::new();
        }
        let ops = [SamplerOp::OrderFillable {
            orders: orders.to_vec(),
        }];
        let outcome = self.probe(&ops).await.into_iter().next().flatten();
        pair_fillable(orders, outcome)
    }

    /// Sample several buy requests through one `execute_batch` round trip.
    ///
    /// Returns one snapshot per item in item order; a failed batch yields
    /// snapshots with no liquidity rather than an error.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub async fn sample_batch_buy(
        &self,
        items: &[BatchBuyItem<'_>],
        sources: &SourceFilters,
        fee_sources: &SourceFilters,
        num_samples: usize,
        sample_distribution_base_bps: u32,
    ) -> Vec<MarketSideLiquidity> {
        let settlement = self.engine.settlement_token.as_str();
        let sampled = sources.sampled_sources();
        let fee = fee_sources.sampled_sources();
        let spot = [self.engine.spot_sample_amount.clone()];

        let mut layouts = Vec::with_capacity(items.len());
        let mut ops_per_item = Vec::with_capacity(items.len());
        for item in items {
            let (input_token, output_token) = (item.maker_token, item.taker_token);
            let amounts = sample_amounts(item.amount, num_samples, sample_distribution_base_bps);
            let mut ops = Vec::new();
            let mut layout = ItemLayout::default();

            if !item.orders.is_empty() && sources.is_allowed(Source::Native) {
                ops.push(SamplerOp::OrderFillable {
                    orders: item.orders.to_vec(),
                });
                layout.fillable = true;
            }
            let ladder = quote_ops(&sampled, Side::Buy, input_token, output_token, &amounts);
            layout.ladder = ladder.iter().map(SamplerOp::source).collect();
            ops.extend(ladder);
            if settlement != input_token {
                let spot_ops = quote_ops(&fee, Side::Sell, settlement, input_token, &spot);
                layout.spot_input = spot_ops.iter().map(SamplerOp::source).collect();
                ops.extend(spot_ops);
            }
            if settlement != output_token {
                let spot_ops = quote_ops(&fee, Side::Sell, settlement, output_token, &spot);
                layout.spot_output = spot_ops.iter().map(SamplerOp::source).collect();
                ops.extend(spot_ops);
            }
            layouts.push(layout);
            ops_per_item.push(ops);
        }

        let expected: usize = layouts.iter().map(ItemLayout::len).sum();
        let res = tokio::time::timeout(
            self.engine.probe_timeout,
            self.executor.execute_batch(&ops_per_item),
        )
        .await;
        let outcomes: Vec<ProbeOutcome> = match res {
            Ok(Ok(outcomes)) if outcomes.len() == expected => outcomes,
            Ok(Ok(outcomes)) => {
                debug!(expected, got = outcomes.len(), "batch probe returned wrong result count");
                vec![None; expected]
            }
            Ok(Err(err)) => {
                debug!(error = %err, "batch probe failed; absorbing");
                vec![None; expected]
            }
            Err(_) => {
                debug!("batch probe timed out; absorbing");
                vec![None; expected]
            }
        };

        let mut outcomes = outcomes.into_iter();
        let mut snapshots = Vec::with_capacity(items.len());
        for ((item, layout), ops) in items.iter().zip(layouts).zip(&ops_per_item) {
            let mut item_outcomes: Vec<ProbeOutcome> = outcomes.by_ref().take(layout.len()).collect();
            for (op, outcome) in ops.iter().zip(item_outcomes.iter_mut()) {
                if outcome.as_ref().is_some_and(|v| v.len() != op.expected_len()) {
                    *outcome = None;
                }
            }
            let mut it = item_outcomes.into_iter();

            let orders = if layout.fillable {
                pair_fillable(item.orders, it.next().flatten())
            } else {
                Vec::new()
            };
            let amounts = sample_amounts(item.amount, num_samples, sample_distribution_base_bps);
            let mut dex_quotes = BTreeMap::new();
            for source in &layout.ladder {
                dex_quotes.insert(*source, to_curve(*source, &amounts, it.next().flatten()));
            }
            let eth_to_input_rate = spot_rate_from(&layout.spot_input, &spot, &mut it, settlement == item.maker_token);
            let eth_to_output_rate = spot_rate_from(&layout.spot_output, &spot, &mut it, settlement == item.taker_token);

            snapshots.push(MarketSideLiquidity {
                side: Side::Buy,
                input_amount: item.amount.clone(),
                input_token: item.maker_token.to_string(),
                output_token: item.taker_token.to_string(),
                eth_to_input_rate,
                eth_to_output_rate,
                orders,
                dex_quotes,
                two_hop_quotes: Vec::new(),
                rfq_quotes: Vec::new(),
                quote_source_filters: sources.clone(),
            });
        }
        snapshots
    }

    /// Execute one batch of ops under the probe timeout.
    ///
    /// A failed or malformed batch yields `None` for every op.
    async fn probe(&self, ops: &[SamplerOp]) -> Vec<ProbeOutcome> {
        if ops.is_empty() {
            return Vec::new();
        }
        let res = tokio::time::timeout(self.engine.probe_timeout, self.executor.execute(ops)).await;
        let outcomes = match res {
            Ok(Ok(outcomes)) if outcomes.len() == ops.len() => outcomes,
            Ok(Ok(outcomes)) => {
                debug!(expected = ops.len(), got = outcomes.len(), "probe returned wrong result count");
                vec![None; ops.len()]
            }
            Ok(Err(err)) => {
                debug!(error = %err, ops = ops.len(), "probe batch failed; absorbing");
                vec![None; ops.len()]
            }
            Err(_) => {
                debug!(ops = ops.len(), "probe batch timed out; absorbing");
                vec![None; ops.len()]
            }
        };
        ops.iter()
            .zip(outcomes)
            .map(|(op, outcome)| outcome.filter(|v| v.len() == op.expected_len()))
            .collect()
    }
}

fn quote_ops(
    sources: &[Source],
    side: Side,
    input_token: &str,
    output_token: &str,
    amounts: &[BigUint],
) -> Vec<SamplerOp> {
    if amounts.is_empty() {
        return Vec::new();
    }
    sources
        .iter()
        .filter_map(|&s| SamplerOp::quotes(s, side, input_token, output_token, amounts.to_vec()))
        .collect()
}

/// Record an absorbed source failure.
fn absorb(source: Source, reason: String) {
    let err = AggrError::SourceProbeFailure {
        venue: source,
        reason,
    };
    SOURCE_PROBE_FAILURES.with_label_values(&[source.name()]).inc();
    debug!(source = %source, error = %err, "absorbed source probe failure");
}

fn to_curve(source: Source, amounts: &[BigUint], outcome: ProbeOutcome) -> Vec<DexSample> {
    match outcome {
        Some(outputs) => amounts
            .iter()
            .zip(outputs)
            .map(|(input, output)| DexSample {
                source,
                input: input.clone(),
                output,
            })
            .collect(),
        None => {
            absorb(source, "probe reverted".to_string());
            Vec::new()
        }
    }
}

fn pair_fillable(orders: &[StandingOrder], outcome: ProbeOutcome) -> Vec<FillableOrder> {
    let fillable = match outcome {
        Some(amounts) => amounts,
        None => {
            absorb(Source::Native, "fillable probe reverted".to_string());
            vec![BigUint::zero(); orders.len()]
        }
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    orders
        .iter()
        .zip(fillable)
        .map(|(order, amount)| {
            let expired = order.expiry.is_some_and(|e| e <= now);
            FillableOrder {
                order: order.clone(),
                fillable_taker_amount: if expired { BigUint::zero() } else { amount },
            }
        })
        .collect()
}

fn spot_rates<'a>(points: impl Iterator<Item = &'a DexSample>) -> Vec<BigRational> {
    points
        .filter(|s| !s.output.is_zero())
        .map(|s| ratio(&s.output, &s.input))
        .collect()
}

fn spot_rate_from(
    sources: &[Source],
    spot: &[BigUint],
    outcomes: &mut impl Iterator<Item = ProbeOutcome>,
    is_settlement: bool,
) -> BigRational {
    if is_settlement {
        return BigRational::one();
    }
    let points: Vec<DexSample> = sources
        .iter()
        .filter_map(|&source| {
            let outcome = outcomes.next().flatten();
            to_curve(source, spot, outcome).into_iter().next()
        })
        .collect();
    median_rate(spot_rates(points.iter()))
}

/// Best single-point quote across curves: highest output on sells, lowest
/// positive cost on buys. Ties keep the earlier source.
fn best_point(side: Side, curves: &BTreeMap<Source, Vec<DexSample>>) -> Option<(Source, BigUint)> {
    let mut best: Option<(Source, BigUint)> = None;
    for sample in curves.values().filter_map(|c| c.first()) {
        if sample.output.is_zero() {
            continue;
        }
        let better = match &best {
            None => true,
            Some((_, current)) => match side {
                Side::Sell => sample.output > *current,
                Side::Buy => sample.output < *current,
            },
        };
        if better {
            best = Some((sample.source, sample.output.clone()));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: Source, output: u64) -> DexSample {
        DexSample {
            source,
            input: BigUint::from(100u32),
            output: BigUint::from(output),
        }
    }

    #[test]
    fn best_point_is_side_aware() {
        let mut curves = BTreeMap::new();
        curves.insert(Source::Curve, vec![sample(Source::Curve, 90)]);
        curves.insert(Source::UniswapV2, vec![sample(Source::UniswapV2, 95)]);
        curves.insert(Source::Dodo, vec![sample(Source::Dodo, 0)]);
        curves.insert(Source::Kyber, Vec::new());
        assert_eq!(
            best_point(Side::Sell, &curves),
            Some((Source::UniswapV2, BigUint::from(95u32)))
        );
        assert_eq!(
            best_point(Side::Buy, &curves),
            Some((Source::Curve, BigUint::from(90u32)))
        );
    }

    #[test]
    fn failed_fillable_probe_means_unfillable() {
        let order = StandingOrder {
            id: "a".into(),
            maker: "0x1".into(),
            maker_token: "0xm".into(),
            taker_token: "0xt".into(),
            maker_amount: BigUint::from(10u32),
            taker_amount: BigUint::from(10u32),
            expiry: None,
        };
        let expired = StandingOrder {
            expiry: Some(1),
            ..order.clone()
        };
        let paired = pair_fillable(&[order.clone()], None);
        assert!(paired[0].fillable_taker_amount.is_zero());
        let paired = pair_fillable(
            &[order, expired],
            Some(vec![BigUint::from(7u32), BigUint::from(7u32)]),
        );
        assert_eq!(paired[0].fillable_taker_amount, BigUint::from(7u32));
        assert!(paired[1].fillable_taker_amount.is_zero());
    }
}
