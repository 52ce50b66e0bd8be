// Fill normalizer
// This file turns sampled curves, standing orders and market-maker quotes into
// per-source chains of gas-adjusted fills the path optimizer can compare
//
// Numan Thabit 2025 Nov

use crate::config::QuoteOptions;
use crate::market::{DexSample, MarketSideLiquidity, Side, TwoHopSample};
use crate::quant::{ceil_to_uint, mul_div_ceil, mul_div_floor, ratio, signed_ratio, to_int, to_ratio};
use crate::serde_helpers::{amount, signed_amount};
use crate::sources::Source;
use num::{BigInt, BigRational, BigUint, Signed, Zero};
use serde::Serialize;

/// Prices settlement-currency costs in output-token units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPricer {
    eth_to_input_rate: BigRational,
    eth_to_output_rate: BigRational,
}

impl GasPricer {
    pub fn new(eth_to_input_rate: BigRational, eth_to_output_rate: BigRational) -> Self {
        Self {
            eth_to_input_rate,
            eth_to_output_rate,
        }
    }

    pub fn from_liquidity(liquidity: &MarketSideLiquidity) -> Self {
        Self::new(
            liquidity.eth_to_input_rate.clone(),
            liquidity.eth_to_output_rate.clone(),
        )
    }

    /// `fee` (settlement units) in output units for a trade of `input` for `output`.
    ///
    /// Falls back to the input rate scaled by the trade's own price when the output
    /// rate is unknown; zero when neither rate is known. Rounded up.
    pub fn to_output(&self, fee: &BigUint, input: &BigUint, output: &BigUint) -> BigUint {
        if fee.is_zero() {
            return BigUint::zero();
        }
        let rate = if !self.eth_to_output_rate.is_zero() {
            self.eth_to_output_rate.clone()
        } else if !self.eth_to_input_rate.is_zero() {
            &self.eth_to_input_rate * ratio(output, input)
        } else {
            return BigUint::zero();
        };
        ceil_to_uint(&(to_ratio(fee) * rate))
    }
}

/// Where a fill's liquidity comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillData {
    Sampled,
    Order { id: String, maker: String },
    Quote { id: String, maker: String, is_firm: bool },
    TwoHop(TwoHopSample),
}

/// One incremental, gas-adjusted slice of liquidity.
///
/// `input` and `output` are the increment over the previous link of the same
/// chain, not cumulative curve values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub source: Source,
    #[serde(with = "amount")]
    pub input: BigUint,
    #[serde(with = "amount")]
    pub output: BigUint,
    /// Settlement-currency cost charged for this link.
    #[serde(with = "amount")]
    pub fee: BigUint,
    /// `fee` priced in output units.
    #[serde(with = "amount")]
    pub penalty: BigUint,
    /// Output net of the penalty on sells, cost including it on buys.
    #[serde(with = "signed_amount")]
    pub adjusted_output: BigInt,
    /// Position within the source's chain.
    pub index: usize,
    pub is_native: bool,
    pub data: FillData,
}

impl Fill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: Side,
        source: Source,
        input: BigUint,
        output: BigUint,
        fee: BigUint,
        index: usize,
        pricer: &GasPricer,
        data: FillData,
    ) -> Self {
        let penalty = pricer.to_output(&fee, &input, &output);
        let adjusted_output = adjust(side, &output, &penalty);
        Self {
            source,
            input,
            output,
            fee,
            penalty,
            adjusted_output,
            index,
            is_native: source.is_native_liquidity(),
            data,
        }
    }

    /// Marginal adjusted rate, oriented so that higher is always better:
    /// output per input on sells, input per unit cost on buys.
    pub fn rate(&self, side: Side) -> BigRational {
        oriented_rate(side, &self.input, &self.adjusted_output)
    }

    /// Source flags touched by this fill, legs of a two-hop route included.
    pub fn flags(&self) -> u64 {
        match &self.data {
            FillData::TwoHop(hop) => {
                self.source.flag() | hop.first_source.flag() | hop.second_source.flag()
            }
            _ => self.source.flag(),
        }
    }

    /// Pro-rata slice of this fill consuming only `input`.
    ///
    /// Output rounds against the taker: down on sells, up on buys. The penalty
    /// is kept whole.
    pub fn clip(&self, side: Side, input: &BigUint) -> Fill {
        if input >= &self.input {
            return self.clone();
        }
        let output = match side {
            Side::Sell => mul_div_floor(&self.output, input, &self.input),
            Side::Buy => mul_div_ceil(&self.output, input, &self.input),
        };
        Fill {
            input: input.clone(),
            adjusted_output: adjust(side, &output, &self.penalty),
            output,
            ..self.clone()
        }
    }
}

fn adjust(side: Side, output: &BigUint, penalty: &BigUint) -> BigInt {
    match side {
        Side::Sell => to_int(output) - to_int(penalty),
        Side::Buy => to_int(output) + to_int(penalty),
    }
}

/// Higher-is-better rate of `input` against an adjusted `output`.
pub fn oriented_rate(side: Side, input: &BigUint, adjusted_output: &BigInt) -> BigRational {
    match side {
        Side::Sell => signed_ratio(adjusted_output, input),
        Side::Buy => {
            if !adjusted_output.is_positive() {
                return BigRational::zero();
            }
            BigRational::new(to_int(input), adjusted_output.clone())
        }
    }
}

/// Incremental chain for one source's cumulative curve.
///
/// The chain stops at the first point that does not extend the curve: input
/// not increasing, zero output, or output going backwards. The source fee is
/// charged on the first link only.
pub fn curve_chain(
    side: Side,
    source: Source,
    curve: &[DexSample],
    fee: &BigUint,
    pricer: &GasPricer,
) -> Vec<Fill> {
    let mut chain = Vec::with_capacity(curve.len());
    let mut prev_input = BigUint::zero();
    let mut prev_output = BigUint::zero();
    for sample in curve {
        if sample.input <= prev_input || sample.output.is_zero() || sample.output < prev_output {
            break;
        }
        let index = chain.len();
        let link_fee = if index == 0 { fee.clone() } else { BigUint::zero() };
        chain.push(Fill::new(
            side,
            source,
            &sample.input - &prev_input,
            &sample.output - &prev_output,
            link_fee,
            index,
            pricer,
            FillData::Sampled,
        ));
        prev_input = sample.input.clone();
        prev_output = sample.output.clone();
    }
    chain
}

/// Every eligible chain in the snapshot, in deterministic order: sampled
/// curves by source, then standing orders, then market-maker quotes.
pub fn create_fills(liquidity: &MarketSideLiquidity, opts: &QuoteOptions) -> Vec<Vec<Fill>> {
    let side = liquidity.side;
    let filters = &liquidity.quote_source_filters;
    let pricer = GasPricer::from_liquidity(liquidity);
    let (taker_token, maker_token) = side.taker_maker(&liquidity.input_token, &liquidity.output_token);
    let mut chains = Vec::new();

    for (source, curve) in &liquidity.dex_quotes {
        if !filters.is_allowed(*source) {
            continue;
        }
        let chain = curve_chain(side, *source, curve, &opts.fee_for(*source), &pricer);
        if !chain.is_empty() {
            chains.push(chain);
        }
    }

    if filters.is_allowed(Source::Native) {
        let fee = opts.fee_for(Source::Native);
        for fillable in &liquidity.orders {
            let order = &fillable.order;
            if order.taker_token != taker_token || order.maker_token != maker_token {
                continue;
            }
            let (input, output) = fillable.fill_amounts(side);
            if input.is_zero() || output.is_zero() {
                continue;
            }
            let data = FillData::Order {
                id: order.id.clone(),
                maker: order.maker.clone(),
            };
            chains.push(vec![Fill::new(
                side,
                Source::Native,
                input,
                output,
                fee.clone(),
                0,
                &pricer,
                data,
            )]);
        }
    }

    if filters.is_allowed(Source::Rfq) {
        let fee = opts.fee_for(Source::Rfq);
        for quote in &liquidity.rfq_quotes {
            if quote.taker_token != taker_token || quote.maker_token != maker_token {
                continue;
            }
            let (input, output) = quote.fill_amounts(side);
            if input.is_zero() || output.is_zero() {
                continue;
            }
            let data = FillData::Quote {
                id: quote.id.clone(),
                maker: quote.maker.clone(),
                is_firm: quote.is_firm,
            };
            chains.push(vec![Fill::new(
                side,
                Source::Rfq,
                input,
                output,
                fee.clone(),
                0,
                &pricer,
                data,
            )]);
        }
    }
    chains
}
