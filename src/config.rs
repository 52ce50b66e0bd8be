// Configuration management module
// This file handles loading of process configuration from files and environment
// variables, the immutable engine configuration derived from it, and the
// per-request quote options every entry point recognizes
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::market::Token;
use crate::router::validation::is_token_address;
use crate::serde_helpers::{amount, amount_map};
use crate::sources::{Source, SourceFilters};
use anyhow::{Context, Result};
use num::{BigUint, Zero};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RUN_LIMIT: usize = 1 << 15;
pub const DEFAULT_NUM_SAMPLES: usize = 13;
pub const DEFAULT_SAMPLE_DISTRIBUTION_BASE_BPS: u32 = 10_500;
pub const DEFAULT_BRIDGE_SLIPPAGE_BPS: u32 = 50;
pub const DEFAULT_MAX_FALLBACK_SLIPPAGE_BPS: u32 = 500;

const DEFAULT_CONFIG_PATH: &str = "config/router";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP API bind address (defaults to 0.0.0.0:8080)
    pub listen_addr: Option<String>,
    /// JSON-RPC endpoint executing batched sampler probes
    pub sampler_endpoint: Url,
    /// Comma separated market-maker quote endpoints (optional)
    pub rfq_endpoints: Option<String>,
    /// Settlement currency used to price gas, e.g. wrapped ether
    pub settlement_token: String,
    /// Per-probe timeout in milliseconds
    pub probe_timeout_ms: Option<u64>,
    /// Per-maker quote timeout in milliseconds
    pub rfq_timeout_ms: Option<u64>,
    /// Settlement-currency amount sold when sampling spot rates (decimal string)
    pub spot_sample_amount: Option<String>,
    /// Intermediate tokens reachable from each token
    pub token_adjacency: Option<BTreeMap<String, Vec<String>>>,
    /// Intermediate tokens for tokens absent from the adjacency map
    pub default_intermediaries: Option<Vec<String>>,
    /// Settlement overhead charged per distinct source (decimal string, settlement units)
    pub overhead_per_source: Option<String>,
    /// Defaults applied to requests that omit options
    pub quote_defaults: Option<QuoteOptions>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = std::env::var("LIQUIDITY_ROUTER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("ROUTER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("build configuration from {path} and environment"))?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    pub fn rfq_endpoint_urls(&self) -> Result<Vec<Url>> {
        let Some(raw) = &self.rfq_endpoints else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Url::parse(s).with_context(|| format!("invalid market-maker endpoint: {s}")))
            .collect()
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut engine = EngineConfig {
            settlement_token: normalize_token(&self.settlement_token),
            ..EngineConfig::default()
        };
        if let Some(ms) = self.probe_timeout_ms {
            engine.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.rfq_timeout_ms {
            engine.rfq_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = &self.spot_sample_amount {
            engine.spot_sample_amount = BigUint::from_str(raw.trim())
                .with_context(|| format!("invalid spot sample amount: {raw}"))?;
        }
        engine.token_adjacency = TokenAdjacencyGraph::new(
            self.token_adjacency.clone().unwrap_or_default(),
            self.default_intermediaries.clone().unwrap_or_default(),
        );
        engine.validate()?;
        Ok(engine)
    }

    pub fn default_quote_options(&self) -> Result<QuoteOptions> {
        let mut opts = self.quote_defaults.clone().unwrap_or_default();
        if let Some(raw) = &self.overhead_per_source {
            let per_source = BigUint::from_str(raw.trim())
                .with_context(|| format!("invalid overhead per source: {raw}"))?;
            opts.settlement_overhead = OverheadEstimator::per_source(per_source);
        }
        Ok(opts)
    }
}

pub fn normalize_token(token: &str) -> Token {
    token.trim().to_ascii_lowercase()
}

/// Immutable engine configuration, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settlement_token: Token,
    pub token_adjacency: TokenAdjacencyGraph,
    pub sell_sources: SourceFilters,
    pub buy_sources: SourceFilters,
    pub fee_sources: SourceFilters,
    pub probe_timeout: Duration,
    pub rfq_timeout: Duration,
    /// Settlement-currency base units sold per spot-rate probe.
    pub spot_sample_amount: BigUint,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), AggrError> {
        if !is_token_address(&self.settlement_token) {
            return Err(AggrError::Config(format!(
                "settlement token {} is not a 20-byte hex address",
                self.settlement_token
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(AggrError::Config("probe timeout must be positive".to_string()));
        }
        if self.sell_sources.is_empty() && self.buy_sources.is_empty() {
            return Err(AggrError::Config("no sources enabled on either side".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // wrapped ether on mainnet
            settlement_token: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            token_adjacency: TokenAdjacencyGraph::default(),
            sell_sources: SourceFilters::default_sell(),
            buy_sources: SourceFilters::default_buy(),
            fee_sources: SourceFilters::default_fee(),
            probe_timeout: Duration::from_millis(1_500),
            rfq_timeout: Duration::from_millis(600),
            spot_sample_amount: BigUint::from(10u32).pow(18),
        }
    }
}

/// Which intermediate tokens a two-hop route may pass through.
#[derive(Debug, Clone, Default)]
pub struct TokenAdjacencyGraph {
    edges: BTreeMap<Token, Vec<Token>>,
    default_tokens: Vec<Token>,
}

impl TokenAdjacencyGraph {
    pub fn new(edges: BTreeMap<String, Vec<String>>, default_tokens: Vec<String>) -> Self {
        Self {
            edges: edges
                .into_iter()
                .map(|(k, v)| {
                    (
                        normalize_token(&k),
                        v.iter().map(|t| normalize_token(t)).collect(),
                    )
                })
                .collect(),
            default_tokens: default_tokens.iter().map(|t| normalize_token(t)).collect(),
        }
    }

    pub fn neighbors(&self, token: &str) -> &[Token] {
        self.edges
            .get(token)
            .map(Vec::as_slice)
            .unwrap_or(self.default_tokens.as_slice())
    }

    /// Tokens adjacent to both `a` and `b`, in `a`'s adjacency order.
    pub fn intermediaries(&self, a: &str, b: &str) -> Vec<Token> {
        let from_b = self.neighbors(b);
        let mut out: Vec<Token> = Vec::new();
        for t in self.neighbors(a) {
            if t != a && t != b && from_b.contains(t) && !out.contains(t) {
                out.push(t.clone());
            }
        }
        out
    }
}

/// Settlement overhead (in settlement-currency units) charged for a path,
/// given the source-flags mask of the sources it touches.
#[derive(Clone)]
pub struct OverheadEstimator(Arc<dyn Fn(u64) -> BigUint + Send + Sync>);

impl OverheadEstimator {
    pub fn new(f: impl Fn(u64) -> BigUint + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn zero() -> Self {
        Self::new(|_| BigUint::zero())
    }

    /// Fixed cost per distinct source touched.
    pub fn per_source(cost: BigUint) -> Self {
        Self::new(move |flags| &cost * BigUint::from(flags.count_ones()))
    }

    pub fn estimate(&self, source_flags: u64) -> BigUint {
        (self.0)(source_flags)
    }
}

impl Default for OverheadEstimator {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for OverheadEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OverheadEstimator(..)")
    }
}

/// Market-maker quoting parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RfqOptions {
    pub enabled: bool,
    /// Indicative (non-binding) rather than firm quotes.
    pub is_indicative: bool,
    /// Settlement recipient; required for firm quotes.
    pub taker_address: Option<String>,
    pub intent_on_filling: bool,
    /// Request quotes after the first optimization pass, using its price as a floor.
    pub price_aware: bool,
}

/// Options recognized by every quoting entry point.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteOptions {
    pub run_limit: usize,
    pub num_samples: usize,
    pub sample_distribution_base_bps: u32,
    pub bridge_slippage_bps: u32,
    pub max_fallback_slippage_bps: u32,
    pub excluded_sources: Vec<Source>,
    pub included_sources: Vec<Source>,
    pub excluded_fee_sources: Vec<Source>,
    pub included_fee_sources: Vec<Source>,
    /// Settlement-currency cost charged when a source is used; overrides
    /// the source's default gas estimate priced at `gas_price`.
    #[serde(with = "amount_map")]
    pub fee_schedule: BTreeMap<Source, BigUint>,
    /// Settlement-currency units per gas unit.
    #[serde(with = "amount")]
    pub gas_price: BigUint,
    pub allow_fallback: bool,
    pub should_generate_report: bool,
    pub rfq: Option<RfqOptions>,
    #[serde(skip)]
    pub settlement_overhead: OverheadEstimator,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            run_limit: DEFAULT_RUN_LIMIT,
            num_samples: DEFAULT_NUM_SAMPLES,
            sample_distribution_base_bps: DEFAULT_SAMPLE_DISTRIBUTION_BASE_BPS,
            bridge_slippage_bps: DEFAULT_BRIDGE_SLIPPAGE_BPS,
            max_fallback_slippage_bps: DEFAULT_MAX_FALLBACK_SLIPPAGE_BPS,
            excluded_sources: Vec::new(),
            included_sources: Vec::new(),
            excluded_fee_sources: Vec::new(),
            included_fee_sources: Vec::new(),
            fee_schedule: BTreeMap::new(),
            gas_price: BigUint::zero(),
            allow_fallback: true,
            should_generate_report: false,
            rfq: None,
            settlement_overhead: OverheadEstimator::zero(),
        }
    }
}

impl QuoteOptions {
    pub fn fee_for(&self, source: Source) -> BigUint {
        match self.fee_schedule.get(&source) {
            Some(fee) => fee.clone(),
            None => &self.gas_price * BigUint::from(source.default_gas()),
        }
    }

    /// Enabled market-maker options, if any.
    pub fn rfq_enabled(&self) -> Option<&RfqOptions> {
        self.rfq.as_ref().filter(|r| r.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediaries_are_shared_neighbors() {
        let mut edges = BTreeMap::new();
        edges.insert(
            "0xA".to_string(),
            vec!["0xW".to_string(), "0xU".to_string(), "0xB".to_string()],
        );
        edges.insert("0xb".to_string(), vec!["0xu".to_string(), "0xw".to_string()]);
        let graph = TokenAdjacencyGraph::new(edges, vec!["0xw".to_string()]);
        assert_eq!(graph.intermediaries("0xa", "0xb"), vec!["0xw", "0xu"]);
        // unknown tokens fall back to the default list
        assert_eq!(graph.intermediaries("0xc", "0xd"), vec!["0xw"]);
        assert!(graph.intermediaries("0xa", "0xw").is_empty());
    }

    #[test]
    fn engine_config_rejects_bad_settlement_token() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
        let bad = EngineConfig {
            settlement_token: "weth".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(bad.validate(), Err(AggrError::Config(_))));
        let stalled = EngineConfig {
            probe_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(matches!(stalled.validate(), Err(AggrError::Config(_))));
    }

    #[test]
    fn per_source_overhead_counts_bits() {
        let est = OverheadEstimator::per_source(BigUint::from(7u32));
        let flags = Source::Curve.flag() | Source::UniswapV2.flag();
        assert_eq!(est.estimate(flags), BigUint::from(14u32));
        assert!(OverheadEstimator::default().estimate(flags).is_zero());
    }

    #[test]
    fn quote_options_deserialize_with_defaults() {
        let opts: QuoteOptions = serde_json::from_str(
            r#"{"run_limit": 64, "excluded_sources": ["Kyber"], "fee_schedule": {"Curve": "1000"}}"#,
        )
        .unwrap();
        assert_eq!(opts.run_limit, 64);
        assert_eq!(opts.num_samples, DEFAULT_NUM_SAMPLES);
        assert_eq!(opts.fee_for(Source::Curve), BigUint::from(1000u32));
        // no gas price: unscheduled sources cost nothing
        assert!(opts.fee_for(Source::Dodo).is_zero());

        let priced = QuoteOptions {
            gas_price: BigUint::from(2u32),
            ..opts
        };
        assert_eq!(priced.fee_for(Source::Curve), BigUint::from(1000u32));
        assert_eq!(
            priced.fee_for(Source::Dodo),
            BigUint::from(2 * Source::Dodo.default_gas())
        );
        assert!(opts.allow_fallback);
    }
}
