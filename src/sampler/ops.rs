// Sampler probe operations
// This file defines the read-only simulation calls the sampler batches into a
// single round trip, and the per-source probe method each one resolves to
//
// Numan Thabit 2025 Nov

use crate::market::{Side, StandingOrder, Token};
use crate::serde_helpers::amount_vec;
use crate::sources::Source;
use num::BigUint;
use serde::Serialize;

/// One read-only simulation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerOp {
    /// Maker amounts received for each taker amount sold.
    SellQuotes {
        source: Source,
        method: &'static str,
        taker_token: Token,
        maker_token: Token,
        #[serde(with = "amount_vec")]
        amounts: Vec<BigUint>,
    },
    /// Taker amounts paid for each maker amount bought.
    BuyQuotes {
        source: Source,
        method: &'static str,
        taker_token: Token,
        maker_token: Token,
        #[serde(with = "amount_vec")]
        amounts: Vec<BigUint>,
    },
    /// Remaining fillable taker amount of each standing order.
    OrderFillable { orders: Vec<StandingOrder> },
}

impl SamplerOp {
    /// Side-relative quote probe: `amounts` are in `input_token`, results in `output_token`.
    ///
    /// Returns `None` for sources that cannot be sampled on a curve.
    pub fn quotes(
        source: Source,
        side: Side,
        input_token: &str,
        output_token: &str,
        amounts: Vec<BigUint>,
    ) -> Option<Self> {
        let method = probe_method(source, side)?;
        Some(match side {
            Side::Sell => SamplerOp::SellQuotes {
                source,
                method,
                taker_token: input_token.to_string(),
                maker_token: output_token.to_string(),
                amounts,
            },
            Side::Buy => SamplerOp::BuyQuotes {
                source,
                method,
                taker_token: output_token.to_string(),
                maker_token: input_token.to_string(),
                amounts,
            },
        })
    }

    /// Number of values a successful probe returns.
    pub fn expected_len(&self) -> usize {
        match self {
            SamplerOp::SellQuotes { amounts, .. } | SamplerOp::BuyQuotes { amounts, .. } => {
                amounts.len()
            }
            SamplerOp::OrderFillable { orders } => orders.len(),
        }
    }

    pub fn source(&self) -> Source {
        match self {
            SamplerOp::SellQuotes { source, .. } | SamplerOp::BuyQuotes { source, .. } => *source,
            SamplerOp::OrderFillable { .. } => Source::Native,
        }
    }
}

/// Simulation entry point probing `source` on `side`.
pub fn probe_method(source: Source, side: Side) -> Option<&'static str> {
    let method = match (source, side) {
        (Source::Uniswap, Side::Sell) => "sampleSellsFromUniswap",
        (Source::Uniswap, Side::Buy) => "sampleBuysFromUniswap",
        (Source::UniswapV2, Side::Sell) | (Source::SushiSwap, Side::Sell) => {
            "sampleSellsFromUniswapV2"
        }
        (Source::UniswapV2, Side::Buy) | (Source::SushiSwap, Side::Buy) => {
            "sampleBuysFromUniswapV2"
        }
        (Source::UniswapV3, Side::Sell) => "sampleSellsFromUniswapV3",
        (Source::UniswapV3, Side::Buy) => "sampleBuysFromUniswapV3",
        (Source::Curve, Side::Sell) => "sampleSellsFromCurve",
        (Source::Curve, Side::Buy) => "sampleBuysFromCurve",
        (Source::Balancer, Side::Sell) | (Source::Cream, Side::Sell) => "sampleSellsFromBalancer",
        (Source::Balancer, Side::Buy) | (Source::Cream, Side::Buy) => "sampleBuysFromBalancer",
        (Source::BalancerV2, Side::Sell) => "sampleSellsFromBalancerV2",
        (Source::BalancerV2, Side::Buy) => "sampleBuysFromBalancerV2",
        (Source::Bancor, Side::Sell) => "sampleSellsFromBancor",
        (Source::Kyber, Side::Sell) => "sampleSellsFromKyberNetwork",
        (Source::Mooniswap, Side::Sell) => "sampleSellsFromMooniswap",
        (Source::Mooniswap, Side::Buy) => "sampleBuysFromMooniswap",
        (Source::Dodo, Side::Sell) => "sampleSellsFromDODO",
        (Source::Dodo, Side::Buy) => "sampleBuysFromDODO",
        (Source::Bancor, Side::Buy)
        | (Source::Kyber, Side::Buy)
        | (Source::Native, _)
        | (Source::Rfq, _)
        | (Source::MultiHop, _) => return None,
    };
    Some(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sampled_source_has_a_sell_probe() {
        for source in Source::ALL.into_iter().filter(|s| s.is_sampled()) {
            assert!(probe_method(source, Side::Sell).is_some(), "{source}");
            assert_eq!(probe_method(source, Side::Buy).is_some(), source.default_buy());
        }
    }

    #[test]
    fn buy_probe_swaps_token_roles() {
        let op = SamplerOp::quotes(
            Source::Curve,
            Side::Buy,
            "0xmaker",
            "0xtaker",
            vec![BigUint::from(5u32)],
        )
        .unwrap();
        match op {
            SamplerOp::BuyQuotes {
                taker_token,
                maker_token,
                ..
            } => {
                assert_eq!(taker_token, "0xtaker");
                assert_eq!(maker_token, "0xmaker");
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert!(SamplerOp::quotes(Source::Native, Side::Sell, "a", "b", vec![]).is_none());
    }
}
