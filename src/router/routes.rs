// Plan types and the plan collapser
// This file defines the executable orders and optimizer result returned to
// callers, and collapses a winning path (plus optional fallback) into them
//
// Numan Thabit 2025 Nov

use crate::market::{Side, Token};
use crate::quant::{increase_by_bps, reduce_by_bps};
use crate::router::fills::{Fill, FillData};
use crate::router::path::Path;
use crate::serde_helpers::{amount, rate};
use crate::sources::Source;
use num::{BigRational, BigUint};
use serde::Serialize;

/// How an order is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderFillData {
    Native {
        order_id: String,
        maker: String,
    },
    Rfq {
        quote_id: String,
        maker: String,
        is_firm: bool,
    },
    Dex {
        source: Source,
    },
    TwoHop {
        intermediate_token: Token,
        first_source: Source,
        second_source: Source,
        #[serde(with = "amount")]
        intermediate_amount: BigUint,
    },
}

/// One executable order of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollapsedOrder {
    pub source: Source,
    pub maker_token: Token,
    pub taker_token: Token,
    #[serde(with = "amount")]
    pub maker_amount: BigUint,
    #[serde(with = "amount")]
    pub taker_amount: BigUint,
    /// Side-relative output bound after bridge slippage: minimum maker amount
    /// received on sells, maximum taker amount paid on buys.
    #[serde(with = "amount")]
    pub output_bound: BigUint,
    pub fill_data: OrderFillData,
    /// Part of the contingency path rather than the primary plan.
    pub is_fallback: bool,
    pub fills: Vec<Fill>,
}

impl CollapsedOrder {
    /// (input, output) of this order, relative to the plan's side.
    pub fn io_amounts(&self, side: Side) -> (&BigUint, &BigUint) {
        match side {
            Side::Sell => (&self.taker_amount, &self.maker_amount),
            Side::Buy => (&self.maker_amount, &self.taker_amount),
        }
    }
}

/// The plan for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizerResult {
    pub side: Side,
    pub orders: Vec<CollapsedOrder>,
    /// Fills of the primary path, for reporting.
    pub liquidity_delivered: Vec<Fill>,
    pub source_flags: u64,
    pub is_two_hop: bool,
    #[serde(with = "rate")]
    pub adjusted_rate: BigRational,
}

impl OptimizerResult {
    pub fn primary_orders(&self) -> impl Iterator<Item = &CollapsedOrder> {
        self.orders.iter().filter(|o| !o.is_fallback)
    }

    pub fn has_fallback(&self) -> bool {
        self.orders.iter().any(|o| o.is_fallback)
    }

    /// Summed (input, output) of the primary orders.
    pub fn primary_amounts(&self) -> (BigUint, BigUint) {
        self.primary_orders()
            .map(|o| o.io_amounts(self.side))
            .fold((BigUint::default(), BigUint::default()), |(i, o), (oi, oo)| {
                (i + oi, o + oo)
            })
    }

    pub fn sources(&self) -> Vec<Source> {
        Source::from_flags(self.source_flags)
    }
}

/// Token pair and slippage settings shared by every order of a plan.
#[derive(Debug, Clone, Copy)]
pub struct CollapseContext<'a> {
    pub side: Side,
    pub input_token: &'a str,
    pub output_token: &'a str,
    pub bridge_slippage_bps: u32,
}

/// Collapse `primary` and an optional `fallback` into executable orders.
///
/// Fills from one sampled source merge into a single order; every standing
/// order, quote and two-hop route stays its own order.
pub fn collapse(
    ctx: CollapseContext<'_>,
    primary: &Path,
    fallback: Option<&Path>,
    is_two_hop: bool,
) -> OptimizerResult {
    let mut orders = collapse_path(&ctx, primary, false);
    let mut source_flags = primary.source_flags();
    if let Some(fallback) = fallback {
        orders.extend(collapse_path(&ctx, fallback, true));
        source_flags |= fallback.source_flags();
    }
    OptimizerResult {
        side: ctx.side,
        orders,
        liquidity_delivered: primary.fills.clone(),
        source_flags,
        is_two_hop,
        adjusted_rate: primary.adjusted_rate(),
    }
}

fn collapse_path(ctx: &CollapseContext<'_>, path: &Path, is_fallback: bool) -> Vec<CollapsedOrder> {
    // (source, input, output, fills) per order, in first-appearance order
    let mut groups: Vec<(Source, BigUint, BigUint, Vec<Fill>, Option<OrderFillData>)> = Vec::new();
    for fill in &path.fills {
        let data = match &fill.data {
            FillData::Sampled => None,
            FillData::Order { id, maker } => Some(OrderFillData::Native {
                order_id: id.clone(),
                maker: maker.clone(),
            }),
            FillData::Quote { id, maker, is_firm } => Some(OrderFillData::Rfq {
                quote_id: id.clone(),
                maker: maker.clone(),
                is_firm: *is_firm,
            }),
            FillData::TwoHop(hop) => Some(OrderFillData::TwoHop {
                intermediate_token: hop.intermediate_token.clone(),
                first_source: hop.first_source,
                second_source: hop.second_source,
                intermediate_amount: hop.intermediate_amount.clone(),
            }),
        };
        if data.is_none() {
            if let Some(group) = groups
                .iter_mut()
                .find(|g| g.0 == fill.source && g.4.is_none())
            {
                group.1 += &fill.input;
                group.2 += &fill.output;
                group.3.push(fill.clone());
                continue;
            }
        }
        groups.push((
            fill.source,
            fill.input.clone(),
            fill.output.clone(),
            vec![fill.clone()],
            data,
        ));
    }

    let (taker_token, maker_token) = ctx.side.taker_maker(ctx.input_token, ctx.output_token);
    groups
        .into_iter()
        .map(|(source, input, output, fills, data)| {
            let output_bound = if source.is_native_liquidity() {
                output.clone()
            } else {
                match ctx.side {
                    Side::Sell => reduce_by_bps(&output, ctx.bridge_slippage_bps),
                    Side::Buy => increase_by_bps(&output, ctx.bridge_slippage_bps),
                }
            };
            let (taker_amount, maker_amount) = match ctx.side {
                Side::Sell => (input, output),
                Side::Buy => (output, input),
            };
            CollapsedOrder {
                source,
                maker_token: maker_token.to_string(),
                taker_token: taker_token.to_string(),
                maker_amount,
                taker_amount,
                output_bound,
                fill_data: data.unwrap_or(OrderFillData::Dex { source }),
                is_fallback,
                fills,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::DexSample;
    use crate::router::fills::{curve_chain, GasPricer};
    use num::{BigRational, Zero};

    fn u(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn free() -> GasPricer {
        GasPricer::new(BigRational::zero(), BigRational::zero())
    }

    fn ctx(side: Side) -> CollapseContext<'static> {
        CollapseContext {
            side,
            input_token: "0xa",
            output_token: "0xb",
            bridge_slippage_bps: 100,
        }
    }

    #[test]
    fn same_source_links_merge_into_one_order() {
        let curve = [
            DexSample {
                source: Source::Curve,
                input: u(100),
                output: u(90),
            },
            DexSample {
                source: Source::Curve,
                input: u(200),
                output: u(170),
            },
        ];
        let mut path = Path::new(Side::Sell, u(200));
        for fill in curve_chain(Side::Sell, Source::Curve, &curve, &u(0), &free()) {
            path.push(fill);
        }
        let order = Fill::new(
            Side::Sell,
            Source::Native,
            u(10),
            u(10),
            u(0),
            0,
            &free(),
            FillData::Order {
                id: "o1".into(),
                maker: "0xm".into(),
            },
        );
        let mut fallback = Path::new(Side::Sell, u(10));
        fallback.push(order.clone());

        let result = collapse(ctx(Side::Sell), &path, Some(&fallback), false);
        assert_eq!(result.orders.len(), 2);
        let dex = &result.orders[0];
        assert_eq!((dex.taker_amount.clone(), dex.maker_amount.clone()), (u(200), u(170)));
        assert_eq!(dex.output_bound, u(168));
        assert_eq!(dex.taker_token, "0xa");
        assert_eq!(dex.fill_data, OrderFillData::Dex { source: Source::Curve });
        let native = &result.orders[1];
        assert!(native.is_fallback);
        assert_eq!(native.output_bound, u(10));
        assert_eq!(
            result.source_flags,
            Source::Curve.flag() | Source::Native.flag()
        );
        assert_eq!(result.primary_amounts(), (u(200), u(170)));
        assert_eq!(result.liquidity_delivered.len(), 2);
    }

    #[test]
    fn buy_orders_bound_the_cost() {
        let curve = [DexSample {
            source: Source::Dodo,
            input: u(100),
            output: u(1_000),
        }];
        let mut path = Path::new(Side::Buy, u(100));
        for fill in curve_chain(Side::Buy, Source::Dodo, &curve, &u(0), &free()) {
            path.push(fill);
        }
        let result = collapse(ctx(Side::Buy), &path, None, false);
        let order = &result.orders[0];
        assert_eq!(order.maker_amount, u(100));
        assert_eq!(order.taker_amount, u(1_000));
        assert_eq!(order.maker_token, "0xa");
        assert_eq!(order.output_bound, u(1_010));
        assert!(!result.has_fallback());
    }
}
