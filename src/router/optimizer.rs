// Path optimizer
// This file implements the bounded search for the best allocation of a target
// input across fill chains. Each candidate is a greedy merge over the chains of
// an allowed source subset; subsets are explored best-first by dropping sources
// from the current candidate, until the evaluation budget is spent
//
// Numan Thabit 2025 Nov

use crate::config::OverheadEstimator;
use crate::market::Side;
use crate::metrics::OPTIMIZER_EVALUATIONS;
use crate::router::fills::{Fill, GasPricer};
use crate::router::path::Path;
use num::{BigRational, BigUint, Zero};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};
use tracing::debug;

/// Fixed inputs of one search.
#[derive(Debug, Clone)]
pub struct SearchParams<'a> {
    pub side: Side,
    pub target: &'a BigUint,
    /// Maximum number of candidate evaluations. The unrestricted candidate is
    /// always evaluated, so the effective budget is `max(1, run_limit)`.
    pub run_limit: usize,
    pub overhead: &'a OverheadEstimator,
    pub pricer: &'a GasPricer,
}

/// Frontier entry: a source-exclusion mask and the path it produced.
#[derive(Debug)]
struct Candidate {
    excluded: u64,
    seq: u64,
    path: Path,
    raw_rate: BigRational,
}

impl Candidate {
    fn key(&self) -> (bool, &BigRational, Reverse<u64>) {
        (self.path.is_complete(), &self.raw_rate, Reverse(self.seq))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Greedy merge of the chains whose source is not in `excluded`: repeatedly
/// take the chain head with the best marginal adjusted rate until `target` is
/// filled or every allowed chain is exhausted. The last link is clipped so the
/// path never overshoots. Ties go to the earlier chain.
pub fn greedy_merge(side: Side, chains: &[Vec<Fill>], target: &BigUint, excluded: u64) -> Path {
    let mut path = Path::new(side, target.clone());
    let mut heads = vec![0usize; chains.len()];
    let mut remaining = target.clone();

    while !remaining.is_zero() {
        let mut best: Option<(usize, BigRational)> = None;
        for (i, chain) in chains.iter().enumerate() {
            let Some(fill) = chain.get(heads[i]) else {
                continue;
            };
            if fill.source.flag() & excluded != 0 {
                continue;
            }
            let rate = fill.rate(side);
            if best.as_ref().map_or(true, |(_, r)| rate > *r) {
                best = Some((i, rate));
            }
        }
        let Some((i, _)) = best else {
            break;
        };

        let fill = &chains[i][heads[i]];
        heads[i] += 1;
        if fill.input <= remaining {
            remaining -= &fill.input;
            path.push(fill.clone());
        } else {
            let clipped = fill.clip(side, &remaining);
            // a sell link clipped to nothing; its head is spent, try the others
            if clipped.output.is_zero() {
                continue;
            }
            path.push(clipped);
            break;
        }
    }
    path
}

/// Best path for `params.target` within `params.run_limit` evaluations, or
/// `None` when no chain offers a positive fill.
pub fn find_optimal_path(chains: &[Vec<Fill>], params: &SearchParams<'_>) -> Option<Path> {
    if params.target.is_zero() || chains.iter().all(|c| c.is_empty()) {
        return None;
    }

    let evaluate = |excluded: u64| {
        greedy_merge(params.side, chains, params.target, excluded)
            .with_overhead(params.overhead, params.pricer)
    };

    let root = evaluate(0);
    if root.is_empty() {
        return None;
    }
    let mut evaluations = 1usize;
    let mut seq = 0u64;
    let mut visited = BTreeSet::from([0u64]);
    let mut frontier = BinaryHeap::new();
    frontier.push(Candidate {
        excluded: 0,
        seq,
        raw_rate: root.raw_rate(),
        path: root,
    });
    let mut best: Option<(u64, Path)> = None;
    let mut exhausted = false;

    while let Some(node) = frontier.pop() {
        let improves = match &best {
            None => true,
            Some((best_seq, best_path)) => match node.path.rank(best_path) {
                Ordering::Greater => true,
                Ordering::Equal => node.seq < *best_seq,
                Ordering::Less => false,
            },
        };
        if improves {
            best = Some((node.seq, node.path.clone()));
        }
        if exhausted {
            continue;
        }

        // dropping sources from an incomplete path only loses input
        if !node.path.is_complete() {
            continue;
        }
        if let Some((_, best_path)) = &best {
            if best_path.is_complete() && node.raw_rate < best_path.adjusted_rate() {
                continue;
            }
        }

        let mut flags = node.path.settlement_flags();
        while flags != 0 {
            let bit = flags & flags.wrapping_neg();
            flags &= flags - 1;
            let excluded = node.excluded | bit;
            if !visited.insert(excluded) {
                continue;
            }
            if evaluations >= params.run_limit {
                exhausted = true;
                break;
            }
            evaluations += 1;
            let path = evaluate(excluded);
            if path.is_empty() {
                continue;
            }
            seq += 1;
            frontier.push(Candidate {
                excluded,
                seq,
                raw_rate: path.raw_rate(),
                path,
            });
        }
    }

    OPTIMIZER_EVALUATIONS
        .with_label_values(&[params.side.as_str()])
        .inc_by(evaluations as f64);
    let (_, path) = best?;
    debug!(
        evaluations,
        exhausted,
        fills = path.fills.len(),
        sources = path.source_count(),
        complete = path.is_complete(),
        "path search finished"
    );
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::DexSample;
    use crate::router::fills::curve_chain;
    use crate::sources::Source;
    use num::{BigInt, One};

    fn u(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn chain(side: Side, source: Source, points: &[(u64, u64)], pricer: &GasPricer) -> Vec<Fill> {
        let curve: Vec<DexSample> = points
            .iter()
            .map(|&(input, output)| DexSample {
                source,
                input: u(input),
                output: u(output),
            })
            .collect();
        curve_chain(side, source, &curve, &u(0), pricer)
    }

    fn free() -> GasPricer {
        GasPricer::new(BigRational::zero(), BigRational::zero())
    }

    fn three_sources(pricer: &GasPricer) -> Vec<Vec<Fill>> {
        vec![
            chain(Side::Sell, Source::UniswapV2, &[(100, 90), (200, 170)], pricer),
            chain(Side::Sell, Source::Curve, &[(100, 95)], pricer),
            chain(Side::Sell, Source::SushiSwap, &[(150, 130)], pricer),
        ]
    }

    fn search<'a>(
        target: &'a BigUint,
        run_limit: usize,
        overhead: &'a OverheadEstimator,
        pricer: &'a GasPricer,
    ) -> SearchParams<'a> {
        SearchParams {
            side: Side::Sell,
            target,
            run_limit,
            overhead,
            pricer,
        }
    }

    #[test]
    fn greedy_takes_best_prefixes() {
        let pricer = free();
        let chains = three_sources(&pricer);
        let target = u(200);
        let overhead = OverheadEstimator::zero();
        let path = find_optimal_path(&chains, &search(&target, 1 << 15, &overhead, &pricer)).unwrap();
        assert_eq!(path.input, u(200));
        assert_eq!(path.output, u(185));
        assert_eq!(
            path.adjusted_rate(),
            BigRational::new(BigInt::from(185), BigInt::from(200))
        );
        let sources: Vec<Source> = path.fills.iter().map(|f| f.source).collect();
        assert_eq!(sources, vec![Source::Curve, Source::UniswapV2]);
    }

    #[test]
    fn overhead_favors_fewer_sources() {
        let pricer = GasPricer::new(BigRational::zero(), BigRational::one());
        let chains = three_sources(&pricer);
        let target = u(200);
        let overhead = OverheadEstimator::per_source(u(30));
        let path = find_optimal_path(&chains, &search(&target, 1 << 15, &overhead, &pricer)).unwrap();
        assert_eq!(path.settlement_flags(), Source::UniswapV2.flag());
        assert_eq!(path.output, u(170));
        assert_eq!(path.net_output(), BigInt::from(140));

        // a budget of one evaluation keeps the unrestricted greedy path
        let path = find_optimal_path(&chains, &search(&target, 1, &overhead, &pricer)).unwrap();
        assert_eq!(path.output, u(185));
    }

    #[test]
    fn search_is_deterministic_and_within_budget() {
        let pricer = free();
        let chains = three_sources(&pricer);
        let overhead = OverheadEstimator::per_source(u(3));
        for target in [0u64, 1, 7, 99, 100, 250, 451, 10_000] {
            let target = u(target);
            let params = search(&target, 16, &overhead, &pricer);
            let first = find_optimal_path(&chains, &params);
            assert_eq!(first, find_optimal_path(&chains, &params));
            if let Some(path) = first {
                assert!(path.input <= target);
            }
        }
    }

    #[test]
    fn no_liquidity_and_single_fill() {
        let pricer = free();
        let target = u(50);
        let overhead = OverheadEstimator::zero();
        let params = search(&target, 8, &overhead, &pricer);
        assert!(find_optimal_path(&[], &params).is_none());
        assert!(find_optimal_path(&[Vec::new()], &params).is_none());

        let single = vec![chain(Side::Sell, Source::Dodo, &[(50, 40)], &pricer)];
        let path = find_optimal_path(&single, &params).unwrap();
        assert_eq!(path.fills, single[0]);
    }

    #[test]
    fn clipped_to_nothing_falls_through_to_other_chains() {
        let pricer = GasPricer::new(BigRational::zero(), BigRational::one());
        let target = u(1);
        let overhead = OverheadEstimator::zero();
        let dodo = [DexSample {
            source: Source::Dodo,
            input: u(1),
            output: u(1),
        }];
        // curve's head rates better but floors to zero output for one unit
        let chains = vec![
            chain(Side::Sell, Source::Curve, &[(100, 50)], &pricer),
            curve_chain(Side::Sell, Source::Dodo, &dodo, &u(1), &pricer),
        ];
        let path = find_optimal_path(&chains, &search(&target, 8, &overhead, &pricer)).unwrap();
        assert!(path.is_complete());
        assert_eq!(path.settlement_flags(), Source::Dodo.flag());
        assert_eq!(path.output, u(1));
    }

    #[test]
    fn partial_liquidity_returns_partial_path() {
        let pricer = free();
        let target = u(1_000);
        let overhead = OverheadEstimator::zero();
        let chains = vec![chain(Side::Sell, Source::Dodo, &[(50, 40)], &pricer)];
        let path = find_optimal_path(&chains, &search(&target, 8, &overhead, &pricer)).unwrap();
        assert!(!path.is_complete());
        assert_eq!(path.input, u(50));
    }

    #[test]
    fn non_concave_curves_degrade_gracefully() {
        let pricer = free();
        let target = u(300);
        let overhead = OverheadEstimator::zero();
        // marginal rate improves along the curve
        let chains = vec![
            chain(Side::Sell, Source::Balancer, &[(100, 10), (200, 150), (300, 290)], &pricer),
            chain(Side::Sell, Source::Curve, &[(300, 200)], &pricer),
        ];
        let path = find_optimal_path(&chains, &search(&target, 64, &overhead, &pricer)).unwrap();
        assert_eq!(path.input, target);
        assert!(path.output > u(0));
    }

    #[test]
    fn buys_minimize_cost() {
        let pricer = free();
        let target = u(100);
        let overhead = OverheadEstimator::zero();
        let chains = vec![
            chain(Side::Buy, Source::Curve, &[(100, 130)], &pricer),
            chain(Side::Buy, Source::UniswapV2, &[(50, 55), (100, 125)], &pricer),
        ];
        let params = SearchParams {
            side: Side::Buy,
            ..search(&target, 64, &overhead, &pricer)
        };
        let path = find_optimal_path(&chains, &params).unwrap();
        assert_eq!(path.input, u(100));
        assert_eq!(path.output, u(120));
    }
}
