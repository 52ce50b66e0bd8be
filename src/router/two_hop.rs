// Two-hop evaluator
// This file prices each sampled route through an intermediate token as a single
// synthetic fill and picks between the best such route and the direct path
//
// Numan Thabit 2025 Nov

use crate::config::QuoteOptions;
use crate::market::{MarketSideLiquidity, TwoHopSample};
use crate::router::fills::{Fill, FillData};
use crate::router::optimizer::SearchParams;
use crate::router::path::Path;
use crate::sources::Source;
use num::{BigUint, Zero};
use tracing::debug;

/// Settlement fee of a two-hop route: both legs plus the routing overhead.
pub fn two_hop_fee(sample: &TwoHopSample, opts: &QuoteOptions) -> BigUint {
    opts.fee_for(sample.first_source)
        + opts.fee_for(sample.second_source)
        + opts.fee_for(Source::MultiHop)
}

/// Path made of the single synthetic fill for `sample`.
pub fn two_hop_path(sample: &TwoHopSample, opts: &QuoteOptions, params: &SearchParams<'_>) -> Option<Path> {
    if sample.input.is_zero() || sample.output.is_zero() || &sample.input > params.target {
        return None;
    }
    let fill = Fill::new(
        params.side,
        Source::MultiHop,
        sample.input.clone(),
        sample.output.clone(),
        two_hop_fee(sample, opts),
        0,
        params.pricer,
        FillData::TwoHop(sample.clone()),
    );
    let mut path = Path::new(params.side, params.target.clone());
    path.push(fill);
    Some(path.with_overhead(params.overhead, params.pricer))
}

/// Best two-hop route in the snapshot, if multi-hop routing is allowed.
pub fn best_two_hop_path(
    liquidity: &MarketSideLiquidity,
    opts: &QuoteOptions,
    params: &SearchParams<'_>,
) -> Option<Path> {
    if !liquidity.quote_source_filters.is_allowed(Source::MultiHop) {
        return None;
    }
    let mut best: Option<Path> = None;
    for sample in &liquidity.two_hop_quotes {
        let Some(path) = two_hop_path(sample, opts, params) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| path.is_better_than(b)) {
            best = Some(path);
        }
    }
    best
}

/// Pick the direct path or the two-hop route, whole. The two-hop route wins
/// only when strictly better. Returns the winner and whether it is two-hop.
pub fn choose_route(direct: Option<Path>, two_hop: Option<Path>) -> Option<(Path, bool)> {
    match (direct, two_hop) {
        (Some(direct), Some(hop)) => {
            if hop.is_better_than(&direct) {
                debug!(
                    direct_output = %direct.output,
                    two_hop_output = %hop.output,
                    "two-hop route beats direct path"
                );
                Some((hop, true))
            } else {
                Some((direct, false))
            }
        }
        (Some(direct), None) => Some((direct, false)),
        (None, Some(hop)) => Some((hop, true)),
        (None, None) => None,
    }
}
