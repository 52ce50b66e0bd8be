// Path representation and ranking
// This file defines an ordered selection of fills against a target input and
// the total order the optimizer, the two-hop evaluator and the fallback
// composer all rank paths by
//
// Numan Thabit 2025 Nov

use crate::config::OverheadEstimator;
use crate::market::Side;
use crate::quant::to_int;
use crate::router::fills::{oriented_rate, Fill, GasPricer};
use num::{BigInt, BigRational, BigUint, Zero};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub side: Side,
    pub target: BigUint,
    pub fills: Vec<Fill>,
    pub input: BigUint,
    pub output: BigUint,
    /// Sum of the fills' adjusted outputs, before path overhead.
    pub adjusted_output: BigInt,
    /// Settlement overhead of the whole path, in output units.
    pub overhead: BigUint,
}

impl Path {
    pub fn new(side: Side, target: BigUint) -> Self {
        Self {
            side,
            target,
            fills: Vec::new(),
            input: BigUint::zero(),
            output: BigUint::zero(),
            adjusted_output: BigInt::zero(),
            overhead: BigUint::zero(),
        }
    }

    pub fn push(&mut self, fill: Fill) {
        self.input += &fill.input;
        self.output += &fill.output;
        self.adjusted_output += &fill.adjusted_output;
        self.fills.push(fill);
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.input >= self.target
    }

    /// Every source touched, two-hop legs included.
    pub fn source_flags(&self) -> u64 {
        self.fills.iter().fold(0, |acc, f| acc | f.flags())
    }

    /// Sources occupying a settlement slot; a two-hop route counts once.
    pub fn settlement_flags(&self) -> u64 {
        self.fills.iter().fold(0, |acc, f| acc | f.source.flag())
    }

    pub fn source_count(&self) -> u32 {
        self.settlement_flags().count_ones()
    }

    pub fn uses_native(&self) -> bool {
        self.fills.iter().any(|f| f.is_native)
    }

    pub fn is_all_native(&self) -> bool {
        !self.fills.is_empty() && self.fills.iter().all(|f| f.is_native)
    }

    /// Price the settlement overhead of this path in output units.
    pub fn with_overhead(mut self, estimator: &OverheadEstimator, pricer: &GasPricer) -> Self {
        let cost = estimator.estimate(self.settlement_flags());
        self.overhead = pricer.to_output(&cost, &self.input, &self.output);
        self
    }

    /// Adjusted output including path overhead.
    pub fn net_output(&self) -> BigInt {
        match self.side {
            Side::Sell => &self.adjusted_output - to_int(&self.overhead),
            Side::Buy => &self.adjusted_output + to_int(&self.overhead),
        }
    }

    /// Adjusted rate net of fill penalties and path overhead; higher is better on
    /// both sides.
    pub fn adjusted_rate(&self) -> BigRational {
        oriented_rate(self.side, &self.input, &self.net_output())
    }

    /// Adjusted rate over the whole target: unfilled sell input earns nothing,
    /// and an unfilled buy cannot be priced at all.
    pub fn complete_rate(&self) -> BigRational {
        if self.is_complete() {
            return self.adjusted_rate();
        }
        match self.side {
            Side::Sell => oriented_rate(self.side, &self.target, &self.net_output()),
            Side::Buy => BigRational::zero(),
        }
    }

    /// Adjusted rate ignoring path overhead. Bounds the adjusted rate of any
    /// path built from a subset of this path's sources.
    pub fn raw_rate(&self) -> BigRational {
        oriented_rate(self.side, &self.input, &self.adjusted_output)
    }

    /// Ranking: complete before incomplete, more input among incomplete paths,
    /// then adjusted rate, then fewer distinct sources.
    pub fn rank(&self, other: &Path) -> Ordering {
        self.is_complete()
            .cmp(&other.is_complete())
            .then_with(|| {
                if self.is_complete() {
                    Ordering::Equal
                } else {
                    self.input.cmp(&other.input)
                }
            })
            .then_with(|| self.adjusted_rate().cmp(&other.adjusted_rate()))
            .then_with(|| other.source_count().cmp(&self.source_count()))
    }

    pub fn is_better_than(&self, other: &Path) -> bool {
        self.rank(other) == Ordering::Greater
    }
}
