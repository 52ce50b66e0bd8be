// Fallback composer
// This file builds the on-chain-only contingency path attached to plans that
// lean on standing orders or market-maker quotes
//
// Numan Thabit 2025 Nov

use crate::quant::bps_ratio;
use crate::router::fills::Fill;
use crate::router::optimizer::{find_optimal_path, SearchParams};
use crate::router::path::Path;
use num::{BigRational, Signed, Zero};
use tracing::debug;

/// Relative loss of `fallback` against `primary`, as a fraction of the primary rate.
pub fn fallback_slippage(primary: &BigRational, fallback: &BigRational) -> BigRational {
    if !primary.is_positive() {
        return BigRational::zero();
    }
    (primary - fallback) / primary
}

/// Non-native fallback for `primary`, or `None` when none is needed or none is
/// acceptable.
///
/// A fallback is attached when the primary path is entirely native liquidity,
/// or when the fallback loses at most `max_slippage_bps` against the primary rate.
/// Rates are taken over the full target, and a fallback that cannot cover a
/// target the primary covers is never attached.
pub fn compose_fallback(
    primary: &Path,
    chains: &[Vec<Fill>],
    params: &SearchParams<'_>,
    allow_fallback: bool,
    max_slippage_bps: u32,
) -> Option<Path> {
    if !allow_fallback || !primary.uses_native() {
        return None;
    }
    let sampled: Vec<Vec<Fill>> = chains
        .iter()
        .filter(|c| c.first().is_some_and(|f| !f.is_native))
        .cloned()
        .collect();
    let fallback = find_optimal_path(&sampled, params)?;

    if primary.is_complete() && !fallback.is_complete() {
        debug!(
            fallback_input = %fallback.input,
            target = %primary.target,
            "fallback cannot cover the target; primary path only"
        );
        return None;
    }
    if primary.is_all_native() {
        debug!(fallback_output = %fallback.output, "attaching fallback to native-only path");
        return Some(fallback);
    }
    let slippage = fallback_slippage(&primary.complete_rate(), &fallback.complete_rate());
    if slippage <= bps_ratio(max_slippage_bps) {
        debug!(fallback_output = %fallback.output, "attaching fallback within slippage bound");
        Some(fallback)
    } else {
        debug!(max_slippage_bps, "fallback too expensive; primary path only");
        None
    }
}
