// Venue integration module
// Interfaces to the collaborators that reach liquidity venues, plus the HTTP
// market-maker quote client used by the service binary
//
// Numan Thabit 2025 Nov

pub mod adapter;
pub mod rfq;

pub use adapter::{PoolCache, ProbeExecutor, ProbeOutcome, QuoteProvider, QuoteRequest, SampleStrategy};
pub use rfq::HttpQuoteProvider;
