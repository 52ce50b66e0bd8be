// Library root module for liquidity-router
// This file defines the public API and module structure for the liquidity-router library
// It exports the sampling, optimization and quoting functionality used by the service binary
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod errors;
pub mod market;
pub mod metrics;
pub mod quant;
pub mod report;
pub mod router;
pub mod sampler;
pub mod serde_helpers;
pub mod sources;
pub mod transport;
pub mod venues;
