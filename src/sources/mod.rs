// Liquidity source catalogue
// This file defines the closed set of liquidity sources the router can draw on,
// together with their static sampling capabilities and default eligibility
//
// Numan Thabit 2025 Nov

pub mod filters;

pub use filters::SourceFilters;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One liquidity venue type.
///
/// Discriminants are stable: they index the bit each source occupies in a
/// path's source-flags mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Standing limit orders supplied with the request.
    Native = 0,
    /// Market-maker quotes (indicative or firm).
    Rfq = 1,
    Uniswap = 2,
    UniswapV2 = 3,
    UniswapV3 = 4,
    SushiSwap = 5,
    Curve = 6,
    Balancer = 7,
    BalancerV2 = 8,
    Cream = 9,
    Bancor = 10,
    Kyber = 11,
    Mooniswap = 12,
    Dodo = 13,
    /// Synthetic route through one intermediate token.
    MultiHop = 14,
}

/// How a source produces quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingVenue {
    /// Simulated inside the batched on-chain probe.
    OnChain,
    /// Backed by an external pool cache that decides between an on-chain probe
    /// and an off-chain quote per token pair.
    PoolCache,
    /// Standing orders; only their fillable remainder is probed.
    StandingOrders,
    /// Quoted over the network by market makers.
    MarketMaker,
    /// Composed from two other sources' samples.
    Synthetic,
}

impl Source {
    pub const ALL: [Source; 15] = [
        Source::Native,
        Source::Rfq,
        Source::Uniswap,
        Source::UniswapV2,
        Source::UniswapV3,
        Source::SushiSwap,
        Source::Curve,
        Source::Balancer,
        Source::BalancerV2,
        Source::Cream,
        Source::Bancor,
        Source::Kyber,
        Source::Mooniswap,
        Source::Dodo,
        Source::MultiHop,
    ];

    /// Bit this source occupies in a source-flags mask.
    pub fn flag(self) -> u64 {
        1u64 << (self as u32)
    }

    pub fn sampling_venue(self) -> SamplingVenue {
        match self {
            Source::Native => SamplingVenue::StandingOrders,
            Source::Rfq => SamplingVenue::MarketMaker,
            Source::MultiHop => SamplingVenue::Synthetic,
            Source::Balancer | Source::Cream => SamplingVenue::PoolCache,
            Source::Uniswap
            | Source::UniswapV2
            | Source::UniswapV3
            | Source::SushiSwap
            | Source::Curve
            | Source::BalancerV2
            | Source::Bancor
            | Source::Kyber
            | Source::Mooniswap
            | Source::Dodo => SamplingVenue::OnChain,
        }
    }

    /// Standing orders and market-maker quotes are less durable between quote
    /// and settlement than sampled curves.
    pub fn is_native_liquidity(self) -> bool {
        matches!(self, Source::Native | Source::Rfq)
    }

    /// Whether the source produces a sampled curve over the input ladder.
    pub fn is_sampled(self) -> bool {
        matches!(
            self.sampling_venue(),
            SamplingVenue::OnChain | SamplingVenue::PoolCache
        )
    }

    /// Whether the source can act as one leg of a two-hop route.
    pub fn supports_hop(self) -> bool {
        self.is_sampled()
    }

    pub fn default_sell(self) -> bool {
        true
    }

    pub fn default_buy(self) -> bool {
        // Bancor and Kyber only quote exact-input swaps.
        !matches!(self, Source::Bancor | Source::Kyber)
    }

    /// Sources consulted when pricing gas into the output token.
    pub fn default_fee(self) -> bool {
        matches!(
            self,
            Source::UniswapV2 | Source::UniswapV3 | Source::SushiSwap
        )
    }

    /// Default gas units one use of this source costs at settlement.
    pub fn default_gas(self) -> u64 {
        match self {
            Source::Native => 100_000,
            Source::Rfq => 90_000,
            Source::Uniswap => 90_000,
            Source::UniswapV2 => 90_000,
            Source::UniswapV3 => 100_000,
            Source::SushiSwap => 90_000,
            Source::Curve => 150_000,
            Source::Balancer => 120_000,
            Source::BalancerV2 => 100_000,
            Source::Cream => 120_000,
            Source::Bancor => 300_000,
            Source::Kyber => 400_000,
            Source::Mooniswap => 130_000,
            Source::Dodo => 100_000,
            // legs are charged separately
            Source::MultiHop => 30_000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Source::Native => "Native",
            Source::Rfq => "Rfq",
            Source::Uniswap => "Uniswap",
            Source::UniswapV2 => "Uniswap_V2",
            Source::UniswapV3 => "Uniswap_V3",
            Source::SushiSwap => "SushiSwap",
            Source::Curve => "Curve",
            Source::Balancer => "Balancer",
            Source::BalancerV2 => "Balancer_V2",
            Source::Cream => "Cream",
            Source::Bancor => "Bancor",
            Source::Kyber => "Kyber",
            Source::Mooniswap => "Mooniswap",
            Source::Dodo => "Dodo",
            Source::MultiHop => "MultiHop",
        }
    }

    /// Sources set in `flags`, in discriminant order.
    pub fn from_flags(flags: u64) -> Vec<Source> {
        Source::ALL
            .iter()
            .copied()
            .filter(|s| flags & s.flag() != 0)
            .collect()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
