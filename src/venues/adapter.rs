// Venue adapter module
// This file defines the collaborator interfaces the sampler and orchestrator
// consume: the batched probe executor, external pool caches and the
// market-maker quote service
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::market::{MarketMakerQuote, Side, Token};
use crate::sampler::ops::SamplerOp;
use async_trait::async_trait;
use num::{BigRational, BigUint};

/// Result of one probe: the returned values, or `None` if the call reverted.
pub type ProbeOutcome = Option<Vec<BigUint>>;

/// Executes read-only simulation calls in one round trip.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// One outcome per op, in op order.
    async fn execute(&self, ops: &[SamplerOp]) -> Result<Vec<ProbeOutcome>, AggrError>;

    /// Several independent items in one round trip; outcomes are flattened in
    /// item order.
    async fn execute_batch(
        &self,
        ops_per_item: &[Vec<SamplerOp>],
    ) -> Result<Vec<ProbeOutcome>, AggrError> {
        let flat: Vec<SamplerOp> = ops_per_item.iter().flatten().cloned().collect();
        self.execute(&flat).await
    }
}

/// Where a pool-cache backed source should be sampled for a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleStrategy {
    pub on_chain: bool,
    pub off_chain: bool,
}

/// Off-chain cache of pools for one venue.
#[async_trait]
pub trait PoolCache: Send + Sync {
    async fn how_to_sample(&self, taker_token: &str, maker_token: &str, allowed: bool)
        -> SampleStrategy;

    /// Side-relative outputs for each input amount, computed from cached pool state.
    async fn quotes_off_chain(
        &self,
        side: Side,
        input_token: &str,
        output_token: &str,
        amounts: &[BigUint],
    ) -> Result<Vec<BigUint>, AggrError>;
}

/// Parameters of one market-maker quote round.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub maker_token: Token,
    pub taker_token: Token,
    /// Taker amount on sells, maker amount on buys.
    pub amount: BigUint,
    pub side: Side,
    /// Output per input of the best plan so far; makers should beat it.
    pub comparison_price: Option<BigRational>,
    pub intent_on_filling: bool,
}

/// External market-maker quote service.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn request_indicative_quotes(
        &self,
        req: &QuoteRequest,
    ) -> Result<Vec<MarketMakerQuote>, AggrError>;

    /// Binding quotes; fails with `InvalidFirmQuoteRequest` without a taker address.
    async fn request_firm_quotes(
        &self,
        req: &QuoteRequest,
        taker_address: Option<&str>,
    ) -> Result<Vec<MarketMakerQuote>, AggrError>;
}
