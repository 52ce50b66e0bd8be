// Metrics and observability module
// This file handles collection of quoting latency, absorbed source failures and
// optimizer effort for the router
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

pub static QUOTE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "router_quote_latency_seconds",
        "end-to-end latency of quote requests",
        &["side", "kind"]
    )
    .unwrap()
});

pub static QUOTE_OUTCOMES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_quote_outcomes_total",
        "quote request outcomes",
        &["side", "outcome"]
    )
    .unwrap()
});

pub static SOURCE_PROBE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_source_probe_failures_total",
        "source probes that reverted, timed out or failed in transport",
        &["source"]
    )
    .unwrap()
});

pub static RFQ_MAKER_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_rfq_maker_errors_total",
        "market maker quote calls that failed",
        &["maker"]
    )
    .unwrap()
});

pub static OPTIMIZER_EVALUATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_optimizer_evaluations_total",
        "candidate paths evaluated by the optimizer",
        &["side"]
    )
    .unwrap()
});

/// Render every registered collector in the text exposition format.
pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
