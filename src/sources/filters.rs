// Source filters
// Set algebra restricting which liquidity sources a request may use
//
// Numan Thabit 2025 Nov

use super::Source;
use serde::Serialize;
use std::collections::BTreeSet;

/// Resolved allow-set of sources.
///
/// An empty set is valid and means "no sources of this kind".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceFilters {
    allowed: BTreeSet<Source>,
}

impl SourceFilters {
    pub fn all() -> Self {
        Self::from_sources(Source::ALL)
    }

    pub fn from_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            allowed: sources.into_iter().collect(),
        }
    }

    pub fn default_sell() -> Self {
        Self::from_sources(Source::ALL.into_iter().filter(|s| s.default_sell()))
    }

    pub fn default_buy() -> Self {
        Self::from_sources(Source::ALL.into_iter().filter(|s| s.default_buy()))
    }

    pub fn default_fee() -> Self {
        Self::from_sources(Source::ALL.into_iter().filter(|s| s.default_fee()))
    }

    /// Remove every source in `sources`.
    pub fn exclude(&self, sources: &[Source]) -> Self {
        Self {
            allowed: self
                .allowed
                .iter()
                .copied()
                .filter(|s| !sources.contains(s))
                .collect(),
        }
    }

    /// Restrict to `sources`; an empty list leaves the filter unchanged.
    pub fn include(&self, sources: &[Source]) -> Self {
        if sources.is_empty() {
            return self.clone();
        }
        Self {
            allowed: self
                .allowed
                .iter()
                .copied()
                .filter(|s| sources.contains(s))
                .collect(),
        }
    }

    pub fn exclude_if(&self, condition: bool, sources: &[Source]) -> Self {
        if condition {
            self.exclude(sources)
        } else {
            self.clone()
        }
    }

    /// Intersection of both allow-sets.
    pub fn merge(&self, other: &SourceFilters) -> Self {
        Self {
            allowed: self.allowed.intersection(&other.allowed).copied().collect(),
        }
    }

    pub fn is_allowed(&self, source: Source) -> bool {
        self.allowed.contains(&source)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Allowed sources in stable order.
    pub fn sources(&self) -> Vec<Source> {
        self.allowed.iter().copied().collect()
    }

    /// Allowed sources that produce sampled curves.
    pub fn sampled_sources(&self) -> Vec<Source> {
        self.allowed.iter().copied().filter(|s| s.is_sampled()).collect()
    }
}
