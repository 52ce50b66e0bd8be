// Market data model
// This file defines the per-request liquidity snapshot and the raw liquidity
// shapes it is assembled from: standing orders, market-maker quotes and samples
//
// Numan Thabit 2025 Nov

use crate::quant::mul_div_floor;
use crate::serde_helpers::{amount, rate};
use crate::sources::{Source, SourceFilters};
use num::{BigRational, BigUint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token identity: a lowercase 0x-prefixed 20-byte hex address.
pub type Token = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Fixed taker amount in, maximize maker amount out.
    Sell,
    /// Fixed maker amount out, minimize taker amount in.
    Buy,
}

impl Side {
    /// (input token, output token) for a maker/taker pair.
    ///
    /// Sells measure input in the taker token; buys measure input in the maker
    /// token and output in the taker token paid for it.
    pub fn io_tokens(self, maker_token: &str, taker_token: &str) -> (Token, Token) {
        match self {
            Side::Sell => (taker_token.to_string(), maker_token.to_string()),
            Side::Buy => (maker_token.to_string(), taker_token.to_string()),
        }
    }

    /// (taker token, maker token) for side-relative (input, output) tokens.
    pub fn taker_maker<'a>(self, input_token: &'a str, output_token: &'a str) -> (&'a str, &'a str) {
        match self {
            Side::Sell => (input_token, output_token),
            Side::Buy => (output_token, input_token),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Sell => "sell",
            Side::Buy => "buy",
        }
    }
}

/// A signed standing limit order supplied with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingOrder {
    pub id: String,
    pub maker: String,
    pub maker_token: Token,
    pub taker_token: Token,
    #[serde(with = "amount")]
    pub maker_amount: BigUint,
    #[serde(with = "amount")]
    pub taker_amount: BigUint,
    /// Unix seconds; `None` never expires.
    #[serde(default)]
    pub expiry: Option<u64>,
}

/// A standing order paired with its currently fillable taker amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillableOrder {
    pub order: StandingOrder,
    #[serde(with = "amount")]
    pub fillable_taker_amount: BigUint,
}

impl FillableOrder {
    /// (input, output) this order can absorb on `side`.
    pub fn fill_amounts(&self, side: Side) -> (BigUint, BigUint) {
        order_fill_amounts(
            side,
            &self.order.maker_amount,
            &self.order.taker_amount,
            &self.fillable_taker_amount,
        )
    }
}

/// A market-maker quote; fully fillable up to its amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMakerQuote {
    pub id: String,
    pub maker: String,
    pub maker_token: Token,
    pub taker_token: Token,
    #[serde(with = "amount")]
    pub maker_amount: BigUint,
    #[serde(with = "amount")]
    pub taker_amount: BigUint,
    #[serde(default)]
    pub is_firm: bool,
}

impl MarketMakerQuote {
    pub fn fill_amounts(&self, side: Side) -> (BigUint, BigUint) {
        order_fill_amounts(side, &self.maker_amount, &self.taker_amount, &self.taker_amount)
    }
}

/// Convert a fillable taker remainder into side-relative (input, output).
pub fn order_fill_amounts(
    side: Side,
    maker_amount: &BigUint,
    taker_amount: &BigUint,
    fillable_taker: &BigUint,
) -> (BigUint, BigUint) {
    let fillable_taker = fillable_taker.min(taker_amount).clone();
    let fillable_maker = mul_div_floor(&fillable_taker, maker_amount, taker_amount);
    match side {
        Side::Sell => (fillable_taker, fillable_maker),
        Side::Buy => (fillable_maker, fillable_taker),
    }
}

/// One observed point on a source's cumulative quote curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexSample {
    pub source: Source,
    #[serde(with = "amount")]
    pub input: BigUint,
    #[serde(with = "amount")]
    pub output: BigUint,
}

/// A synthetic route through one intermediate token, sampled at the full amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoHopSample {
    pub intermediate_token: Token,
    pub first_source: Source,
    pub second_source: Source,
    #[serde(with = "amount")]
    pub input: BigUint,
    #[serde(with = "amount")]
    pub intermediate_amount: BigUint,
    #[serde(with = "amount")]
    pub output: BigUint,
}

/// Everything sampled for one request on one side of the market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSideLiquidity {
    pub side: Side,
    #[serde(with = "amount")]
    pub input_amount: BigUint,
    pub input_token: Token,
    pub output_token: Token,
    /// Input base units per settlement-currency base unit.
    #[serde(with = "rate")]
    pub eth_to_input_rate: BigRational,
    /// Output base units per settlement-currency base unit.
    #[serde(with = "rate")]
    pub eth_to_output_rate: BigRational,
    pub orders: Vec<FillableOrder>,
    pub dex_quotes: BTreeMap<Source, Vec<DexSample>>,
    pub two_hop_quotes: Vec<TwoHopSample>,
    pub rfq_quotes: Vec<MarketMakerQuote>,
    #[serde(skip_deserializing)]
    pub quote_source_filters: SourceFilters,
}

impl MarketSideLiquidity {
    /// A new snapshot extended with late market-maker quotes.
    pub fn with_rfq_quotes(&self, quotes: &[MarketMakerQuote]) -> Self {
        let mut next = self.clone();
        next.rfq_quotes.extend(quotes.iter().cloned());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(maker: u64, taker: u64) -> StandingOrder {
        StandingOrder {
            id: "o1".into(),
            maker: "0x01".into(),
            maker_token: "0xmaker".into(),
            taker_token: "0xtaker".into(),
            maker_amount: BigUint::from(maker),
            taker_amount: BigUint::from(taker),
            expiry: None,
        }
    }

    #[test]
    fn partially_filled_order_scales_both_sides() {
        let fillable = FillableOrder {
            order: order(200, 100),
            fillable_taker_amount: BigUint::from(40u32),
        };
        assert_eq!(
            fillable.fill_amounts(Side::Sell),
            (BigUint::from(40u32), BigUint::from(80u32))
        );
        assert_eq!(
            fillable.fill_amounts(Side::Buy),
            (BigUint::from(80u32), BigUint::from(40u32))
        );
    }

    #[test]
    fn fillable_is_capped_at_order_size() {
        let (input, output) = order_fill_amounts(
            Side::Sell,
            &BigUint::from(10u32),
            &BigUint::from(10u32),
            &BigUint::from(50u32),
        );
        assert_eq!((input, output), (BigUint::from(10u32), BigUint::from(10u32)));
    }

    #[test]
    fn io_tokens_follow_side() {
        assert_eq!(
            Side::Buy.io_tokens("0xm", "0xt"),
            ("0xm".to_string(), "0xt".to_string())
        );
    }
}
