// Error types and error handling module
// This file defines the error taxonomy shared by the sampler, the optimizer
// and the quote-request orchestrator
//
// Numan Thabit 2025 Nov

use crate::sources::Source;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggrError {
    /// At least one standing order is needed to infer the traded pair.
    #[error("no standing orders supplied; cannot infer the traded pair")]
    EmptyOrders,
    #[error("no optimal path: no combination of liquidity fills any amount")]
    NoOptimalPath,
    #[error("firm market-maker quotes require a taker address")]
    InvalidFirmQuoteRequest,
    /// Absorbed inside the sampler; never returned from a public entry point.
    #[error("source {venue} probe failed: {reason}")]
    SourceProbeFailure { venue: Source, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("config error: {0}")]
    Config(String),
}
