// Router module - liquidity aggregation and path optimization
// This file wires the fill normalizer, the path optimizer, the two-hop
// evaluator, the fallback composer and the plan collapser under the
// quote-request orchestrator
//
// Numan Thabit 2025 Nov

pub mod fallback;
pub mod fills;
pub mod optimizer;
pub mod path;
pub mod routes;
pub mod two_hop;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use fills::{Fill, FillData, GasPricer};
pub use optimizer::{find_optimal_path, SearchParams};
pub use path::Path;
pub use router::{create_api_router, optimize, QuoteOutcome, Router};
pub use routes::{CollapsedOrder, OptimizerResult, OrderFillData};
