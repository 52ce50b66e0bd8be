// Liquidity reporting
// This file defines the reporting collaborator interface and the default
// reporter, which breaks the chosen plan down by source
//
// Numan Thabit 2025 Nov

use crate::market::{MarketSideLiquidity, Side};
use crate::router::fills::{Fill, FillData};
use crate::serde_helpers::amount;
use crate::sources::Source;
use num::{BigUint, ToPrimitive, Zero};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything a reporter may look at: the final snapshot and the chosen fills.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub side: Side,
    pub liquidity: &'a MarketSideLiquidity,
    pub chosen: &'a [Fill],
    /// Whether a market-maker quote service was available for the request.
    pub quote_service: bool,
}

/// Builds a report from a finished quote. Must not have side effects.
pub trait ReportGenerator: Send + Sync {
    fn generate_report(&self, input: ReportInput<'_>) -> QuoteReport;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceBreakdown {
    pub source: Source,
    #[serde(with = "amount")]
    pub input: BigUint,
    #[serde(with = "amount")]
    pub output: BigUint,
    /// Share of the filled input, in basis points.
    pub share_bps: u32,
    pub fills: usize,
    pub is_native: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwoHopLegs {
    pub intermediate_token: String,
    pub first_source: Source,
    pub second_source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteReport {
    pub side: Side,
    pub breakdown: Vec<SourceBreakdown>,
    pub sampled_sources: usize,
    pub empty_sources: Vec<Source>,
    pub two_hop_candidates: usize,
    pub two_hop: Option<TwoHopLegs>,
    pub orders_considered: usize,
    pub orders_fillable: usize,
    pub rfq_quotes_considered: usize,
    pub quote_service: bool,
}

/// Default reporter: per-source shares of the chosen fills.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceBreakdownReporter;

impl ReportGenerator for SourceBreakdownReporter {
    fn generate_report(&self, input: ReportInput<'_>) -> QuoteReport {
        let liquidity = input.liquidity;
        let mut by_source: BTreeMap<Source, SourceBreakdown> = BTreeMap::new();
        for fill in input.chosen {
            let entry = by_source.entry(fill.source).or_insert_with(|| SourceBreakdown {
                source: fill.source,
                input: BigUint::zero(),
                output: BigUint::zero(),
                share_bps: 0,
                fills: 0,
                is_native: fill.is_native,
            });
            entry.input += &fill.input;
            entry.output += &fill.output;
            entry.fills += 1;
        }

        let total: BigUint = by_source.values().map(|b| &b.input).sum();
        let mut breakdown: Vec<SourceBreakdown> = by_source.into_values().collect();
        for entry in &mut breakdown {
            if !total.is_zero() {
                let bps = &entry.input * BigUint::from(10_000u32) / &total;
                entry.share_bps = bps.to_u32().unwrap_or(10_000);
            }
        }

        let two_hop = input.chosen.iter().find_map(|f| match &f.data {
            FillData::TwoHop(hop) => Some(TwoHopLegs {
                intermediate_token: hop.intermediate_token.clone(),
                first_source: hop.first_source,
                second_source: hop.second_source,
            }),
            _ => None,
        });

        QuoteReport {
            side: input.side,
            breakdown,
            sampled_sources: liquidity.dex_quotes.len(),
            empty_sources: liquidity
                .dex_quotes
                .iter()
                .filter(|(_, curve)| curve.is_empty())
                .map(|(source, _)| *source)
                .collect(),
            two_hop_candidates: liquidity.two_hop_quotes.len(),
            two_hop,
            orders_considered: liquidity.orders.len(),
            orders_fillable: liquidity
                .orders
                .iter()
                .filter(|o| !o.fillable_taker_amount.is_zero())
                .count(),
            rfq_quotes_considered: liquidity.rfq_quotes.len(),
            quote_service: input.quote_service,
        }
    }
}
