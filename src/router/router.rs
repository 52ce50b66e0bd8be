// Quote-request orchestrator and HTTP API
// This file sequences sampling, optimization and the optional market-maker
// quote round for each request, and exposes the quoting entry points over HTTP
//
// Numan Thabit 2025 Nov

use crate::config::{normalize_token, EngineConfig, QuoteOptions, RfqOptions};
use crate::errors::AggrError;
use crate::market::{MarketMakerQuote, MarketSideLiquidity, Side, StandingOrder, Token};
use crate::metrics::{QUOTE_LATENCY, QUOTE_OUTCOMES};
use crate::quant::{approx, ratio};
use crate::report::{QuoteReport, ReportGenerator, ReportInput, SourceBreakdownReporter};
use crate::router::fallback::compose_fallback;
use crate::router::fills::{create_fills, GasPricer};
use crate::router::optimizer::{find_optimal_path, SearchParams};
use crate::router::routes::{collapse, CollapseContext, OptimizerResult};
use crate::router::two_hop::{best_two_hop_path, choose_route};
use crate::router::validation::validate_quote_request;
use crate::sampler::{BatchBuyItem, QuoteSampler, SampleRequest};
use crate::serde_helpers::amount;
use crate::sources::{Source, SourceFilters};
use crate::venues::adapter::{QuoteProvider, QuoteRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router as AxumRouter,
};
use num::{BigRational, BigUint, Zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A plan plus the optional report generated from the final snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteOutcome {
    pub plan: OptimizerResult,
    pub report: Option<QuoteReport>,
}

/// Public quoting entry point: ties the sampler, the optimizer and the
/// market-maker quote service together.
pub struct Router {
    sampler: Arc<QuoteSampler>,
    engine: Arc<EngineConfig>,
    quote_provider: Option<Arc<dyn QuoteProvider>>,
    reporter: Arc<dyn ReportGenerator>,
}

impl Router {
    pub fn new(sampler: Arc<QuoteSampler>, engine: Arc<EngineConfig>) -> Self {
        Self {
            sampler,
            engine,
            quote_provider: None,
            reporter: Arc::new(SourceBreakdownReporter),
        }
    }

    pub fn with_quote_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.quote_provider = Some(provider);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ReportGenerator>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Liquidity snapshot for selling `taker_amount` of the orders' taker token.
    pub async fn get_market_sell_liquidity(
        &self,
        orders: &[StandingOrder],
        taker_amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<MarketSideLiquidity, AggrError> {
        self.sample_liquidity(Side::Sell, orders, taker_amount, opts).await
    }

    /// Liquidity snapshot for buying `maker_amount` of the orders' maker token.
    pub async fn get_market_buy_liquidity(
        &self,
        orders: &[StandingOrder],
        maker_amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<MarketSideLiquidity, AggrError> {
        self.sample_liquidity(Side::Buy, orders, maker_amount, opts).await
    }

    pub async fn get_market_sell_plan(
        &self,
        orders: &[StandingOrder],
        taker_amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<QuoteOutcome, AggrError> {
        self.plan(Side::Sell, orders, taker_amount, opts).await
    }

    pub async fn get_market_buy_plan(
        &self,
        orders: &[StandingOrder],
        maker_amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<QuoteOutcome, AggrError> {
        self.plan(Side::Buy, orders, maker_amount, opts).await
    }

    /// One optional buy plan per item, sampled in a single batched round trip.
    ///
    /// An item without orders or without any feasible liquidity yields `None`
    /// without affecting its siblings.
    #[tracing::instrument(skip_all, fields(items = orders_per_item.len()))]
    pub async fn get_batch_market_buy_plan(
        &self,
        orders_per_item: &[Vec<StandingOrder>],
        maker_amounts: &[BigUint],
        opts: &QuoteOptions,
    ) -> Result<Vec<Option<OptimizerResult>>, AggrError> {
        if orders_per_item.is_empty() {
            return Err(AggrError::EmptyOrders);
        }
        if orders_per_item.len() != maker_amounts.len() {
            return Err(AggrError::InvalidRequest(format!(
                "{} order sets but {} amounts",
                orders_per_item.len(),
                maker_amounts.len()
            )));
        }
        let _timer = QUOTE_LATENCY
            .with_label_values(&[Side::Buy.as_str(), "batch"])
            .start_timer();

        let normalized: Vec<Vec<StandingOrder>> =
            orders_per_item.iter().map(|o| normalize_orders(o)).collect();
        let pairs: Vec<Option<(Token, Token)>> = normalized.iter().map(|o| infer_pair(o).ok()).collect();

        let mut positions = Vec::new();
        let mut items = Vec::new();
        for (i, (orders, pair)) in normalized.iter().zip(&pairs).enumerate() {
            if let Some((maker_token, taker_token)) = pair {
                positions.push(i);
                items.push(BatchBuyItem {
                    orders,
                    maker_token,
                    taker_token,
                    amount: &maker_amounts[i],
                });
            }
        }

        let (sources, fee_sources) = self.request_filters(Side::Buy, opts);
        let sources = sources.exclude(&[Source::Rfq, Source::MultiHop]);
        let snapshots = self
            .sampler
            .sample_batch_buy(
                &items,
                &sources,
                &fee_sources,
                opts.num_samples,
                opts.sample_distribution_base_bps,
            )
            .await;

        let mut plans: Vec<Option<OptimizerResult>> = vec![None; orders_per_item.len()];
        for (pos, liquidity) in positions.into_iter().zip(snapshots) {
            plans[pos] = match optimize(&liquidity, opts) {
                Ok(plan) => Some(plan),
                Err(AggrError::NoOptimalPath) => {
                    QUOTE_OUTCOMES.with_label_values(&["buy", "no_path"]).inc();
                    None
                }
                Err(err) => return Err(err),
            };
        }
        info!(
            planned = plans.iter().filter(|p| p.is_some()).count(),
            items = plans.len(),
            "batch buy plan finished"
        );
        Ok(plans)
    }

    #[tracing::instrument(skip_all, fields(side = side.as_str(), amount = %amount))]
    async fn plan(
        &self,
        side: Side,
        orders: &[StandingOrder],
        amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<QuoteOutcome, AggrError> {
        let _timer = QUOTE_LATENCY
            .with_label_values(&[side.as_str(), "plan"])
            .start_timer();
        let mut liquidity = self.sample_liquidity(side, orders, amount, opts).await?;

        let mut plan = match optimize(&liquidity, opts) {
            Ok(plan) => Some(plan),
            Err(AggrError::NoOptimalPath) => None,
            Err(err) => return Err(err),
        };

        if let Some(rfq) = opts.rfq_enabled().filter(|r| r.price_aware) {
            if liquidity.quote_source_filters.is_allowed(Source::Rfq) {
                let comparison_price = plan.as_ref().and_then(|p| {
                    let (input, output) = p.primary_amounts();
                    Some(ratio(&output, &input)).filter(|r| !r.is_zero())
                });
                let quotes = self
                    .request_quotes(&liquidity, rfq, comparison_price)
                    .await?;
                if !quotes.is_empty() {
                    let extended = liquidity.with_rfq_quotes(&quotes);
                    match optimize(&extended, opts) {
                        Ok(next) => plan = Some(next),
                        Err(AggrError::NoOptimalPath) => {}
                        Err(err) => return Err(err),
                    }
                    liquidity = extended;
                }
            }
        }

        let Some(plan) = plan else {
            QUOTE_OUTCOMES.with_label_values(&[side.as_str(), "no_path"]).inc();
            return Err(AggrError::NoOptimalPath);
        };
        let outcome = if plan.is_two_hop {
            "two_hop"
        } else if plan.has_fallback() {
            "fallback"
        } else {
            "plan"
        };
        QUOTE_OUTCOMES.with_label_values(&[side.as_str(), outcome]).inc();
        info!(
            sources = ?plan.sources(),
            orders = plan.orders.len(),
            two_hop = plan.is_two_hop,
            fallback = plan.has_fallback(),
            rate = approx(&plan.adjusted_rate),
            "quote plan ready"
        );

        let report = opts.should_generate_report.then(|| {
            self.reporter.generate_report(ReportInput {
                side,
                liquidity: &liquidity,
                chosen: &plan.liquidity_delivered,
                quote_service: self.quote_provider.is_some(),
            })
        });
        Ok(QuoteOutcome { plan, report })
    }

    async fn sample_liquidity(
        &self,
        side: Side,
        orders: &[StandingOrder],
        amount: &BigUint,
        opts: &QuoteOptions,
    ) -> Result<MarketSideLiquidity, AggrError> {
        let orders = normalize_orders(orders);
        let (maker_token, taker_token) = infer_pair(&orders)?;
        let (input_token, output_token) = side.io_tokens(&maker_token, &taker_token);
        let (sources, fee_sources) = self.request_filters(side, opts);

        let req = SampleRequest {
            side,
            orders: &orders,
            input_token: &input_token,
            output_token: &output_token,
            amount,
            sources: &sources,
            fee_sources: &fee_sources,
            num_samples: opts.num_samples,
            sample_distribution_base_bps: opts.sample_distribution_base_bps,
        };

        // indicative quotes ride along with sampling unless they wait for a
        // comparison price
        let early_rfq = opts
            .rfq_enabled()
            .filter(|r| !r.price_aware && sources.is_allowed(Source::Rfq));
        let quote_round = async {
            match early_rfq {
                Some(rfq) => {
                    let quote_req = QuoteRequest {
                        maker_token: maker_token.clone(),
                        taker_token: taker_token.clone(),
                        amount: amount.clone(),
                        side,
                        comparison_price: None,
                        intent_on_filling: rfq.intent_on_filling,
                    };
                    self.ask_indicative(&quote_req).await
                }
                None => Vec::new(),
            }
        };
        let (liquidity, quotes) = tokio::join!(self.sampler.sample_market_side(&req), quote_round);
        Ok(liquidity.with_rfq_quotes(&quotes))
    }

    async fn ask_indicative(&self, req: &QuoteRequest) -> Vec<MarketMakerQuote> {
        let Some(provider) = &self.quote_provider else {
            return Vec::new();
        };
        match provider.request_indicative_quotes(req).await {
            Ok(quotes) => quotes,
            Err(err) => {
                warn!(error = %err, "indicative quote round failed; continuing without quotes");
                Vec::new()
            }
        }
    }

    async fn request_quotes(
        &self,
        liquidity: &MarketSideLiquidity,
        rfq: &RfqOptions,
        comparison_price: Option<BigRational>,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        let (taker_token, maker_token) = liquidity
            .side
            .taker_maker(&liquidity.input_token, &liquidity.output_token);
        let req = QuoteRequest {
            maker_token: maker_token.to_string(),
            taker_token: taker_token.to_string(),
            amount: liquidity.input_amount.clone(),
            side: liquidity.side,
            comparison_price,
            intent_on_filling: rfq.intent_on_filling,
        };
        self.ask_provider(&req, rfq).await
    }

    /// One market-maker round. Only a firm request without a taker fails;
    /// any other provider failure yields no quotes.
    async fn ask_provider(
        &self,
        req: &QuoteRequest,
        rfq: &RfqOptions,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        let taker = if rfq.is_indicative {
            None
        } else {
            Some(
                rfq.taker_address
                    .as_deref()
                    .ok_or(AggrError::InvalidFirmQuoteRequest)?,
            )
        };
        let Some(provider) = &self.quote_provider else {
            return Ok(Vec::new());
        };
        let res = match taker {
            None => provider.request_indicative_quotes(req).await,
            Some(taker) => provider.request_firm_quotes(req, Some(taker)).await,
        };
        match res {
            Ok(quotes) => Ok(quotes),
            Err(AggrError::InvalidFirmQuoteRequest) => Err(AggrError::InvalidFirmQuoteRequest),
            Err(err) => {
                warn!(error = %err, firm = taker.is_some(), "market-maker quote round failed; continuing without quotes");
                Ok(Vec::new())
            }
        }
    }

    /// Allowed sources and fee-pricing sources for a request.
    fn request_filters(&self, side: Side, opts: &QuoteOptions) -> (SourceFilters, SourceFilters) {
        let base = match side {
            Side::Sell => &self.engine.sell_sources,
            Side::Buy => &self.engine.buy_sources,
        };
        let sources = base
            .exclude(&opts.excluded_sources)
            .include(&opts.included_sources)
            .exclude_if(
                opts.rfq_enabled().is_none() || self.quote_provider.is_none(),
                &[Source::Rfq],
            );
        let fee_sources = self
            .engine
            .fee_sources
            .exclude(&opts.excluded_fee_sources)
            .include(&opts.included_fee_sources);
        (sources, fee_sources)
    }
}

/// Normalizer, optimizer, two-hop evaluator, fallback composer and collapser
/// over one snapshot.
pub fn optimize(liquidity: &MarketSideLiquidity, opts: &QuoteOptions) -> Result<OptimizerResult, AggrError> {
    let chains = create_fills(liquidity, opts);
    let pricer = GasPricer::from_liquidity(liquidity);
    let params = SearchParams {
        side: liquidity.side,
        target: &liquidity.input_amount,
        run_limit: opts.run_limit,
        overhead: &opts.settlement_overhead,
        pricer: &pricer,
    };

    let direct = find_optimal_path(&chains, &params);
    let two_hop = best_two_hop_path(liquidity, opts, &params);
    let (primary, is_two_hop) = choose_route(direct, two_hop).ok_or(AggrError::NoOptimalPath)?;

    let fallback = if is_two_hop {
        None
    } else {
        compose_fallback(
            &primary,
            &chains,
            &params,
            opts.allow_fallback,
            opts.max_fallback_slippage_bps,
        )
    };

    let ctx = CollapseContext {
        side: liquidity.side,
        input_token: &liquidity.input_token,
        output_token: &liquidity.output_token,
        bridge_slippage_bps: opts.bridge_slippage_bps,
    };
    Ok(collapse(ctx, &primary, fallback.as_ref(), is_two_hop))
}

fn normalize_orders(orders: &[StandingOrder]) -> Vec<StandingOrder> {
    orders
        .iter()
        .map(|o| StandingOrder {
            maker_token: normalize_token(&o.maker_token),
            taker_token: normalize_token(&o.taker_token),
            ..o.clone()
        })
        .collect()
}

/// (maker token, taker token) of the first order.
fn infer_pair(orders: &[StandingOrder]) -> Result<(Token, Token), AggrError> {
    let first = orders.first().ok_or(AggrError::EmptyOrders)?;
    Ok((first.maker_token.clone(), first.taker_token.clone()))
}

/// Shared state of the HTTP API.
pub struct ApiState {
    router: Arc<Router>,
    defaults: QuoteOptions,
}

#[derive(Debug, Deserialize)]
pub struct QuoteApiRequest {
    pub orders: Vec<StandingOrder>,
    /// Taker amount on sells, maker amount on buys.
    #[serde(with = "amount")]
    pub amount: BigUint,
    #[serde(default)]
    pub options: Option<QuoteOptions>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBuyApiItem {
    pub orders: Vec<StandingOrder>,
    #[serde(with = "amount")]
    pub maker_amount: BigUint,
}

#[derive(Debug, Deserialize)]
pub struct BatchBuyApiRequest {
    pub items: Vec<BatchBuyApiItem>,
    #[serde(default)]
    pub options: Option<QuoteOptions>,
}

#[derive(Debug, Serialize)]
pub struct BatchBuyApiResponse {
    pub plans: Vec<Option<OptimizerResult>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: AggrError) -> ApiError {
    let status = match &err {
        AggrError::EmptyOrders | AggrError::InvalidFirmQuoteRequest | AggrError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        AggrError::NoOptimalPath => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

impl ApiState {
    /// Request options, or the configured defaults; the settlement overhead
    /// estimator always comes from configuration.
    fn options(&self, requested: Option<QuoteOptions>) -> QuoteOptions {
        let mut opts = requested.unwrap_or_else(|| self.defaults.clone());
        opts.settlement_overhead = self.defaults.settlement_overhead.clone();
        opts
    }
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(router: Arc<Router>, defaults: QuoteOptions) -> AxumRouter {
    let state = Arc::new(ApiState { router, defaults });
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/liquidity/sell", post(sell_liquidity))
        .route("/api/v1/liquidity/buy", post(buy_liquidity))
        .route("/api/v1/quote/sell", post(sell_quote))
        .route("/api/v1/quote/buy", post(buy_quote))
        .route("/api/v1/quote/batch-buy", post(batch_buy_quote))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics() -> String {
    crate::metrics::render()
}

async fn sell_liquidity(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<QuoteApiRequest>,
) -> Result<Json<MarketSideLiquidity>, ApiError> {
    let opts = state.options(req.options);
    validate_quote_request(&req.orders, &req.amount, &opts)
        .into_result()
        .map_err(api_error)?;
    let liquidity = state
        .router
        .get_market_sell_liquidity(&req.orders, &req.amount, &opts)
        .await
        .map_err(api_error)?;
    Ok(Json(liquidity))
}

async fn buy_liquidity(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<QuoteApiRequest>,
) -> Result<Json<MarketSideLiquidity>, ApiError> {
    let opts = state.options(req.options);
    validate_quote_request(&req.orders, &req.amount, &opts)
        .into_result()
        .map_err(api_error)?;
    let liquidity = state
        .router
        .get_market_buy_liquidity(&req.orders, &req.amount, &opts)
        .await
        .map_err(api_error)?;
    Ok(Json(liquidity))
}

async fn sell_quote(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<QuoteApiRequest>,
) -> Result<Json<QuoteOutcome>, ApiError> {
    let opts = state.options(req.options);
    validate_quote_request(&req.orders, &req.amount, &opts)
        .into_result()
        .map_err(api_error)?;
    let outcome = state
        .router
        .get_market_sell_plan(&req.orders, &req.amount, &opts)
        .await
        .map_err(api_error)?;
    Ok(Json(outcome))
}

async fn buy_quote(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<QuoteApiRequest>,
) -> Result<Json<QuoteOutcome>, ApiError> {
    let opts = state.options(req.options);
    validate_quote_request(&req.orders, &req.amount, &opts)
        .into_result()
        .map_err(api_error)?;
    let outcome = state
        .router
        .get_market_buy_plan(&req.orders, &req.amount, &opts)
        .await
        .map_err(api_error)?;
    Ok(Json(outcome))
}

async fn batch_buy_quote(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<BatchBuyApiRequest>,
) -> Result<Json<BatchBuyApiResponse>, ApiError> {
    let opts = state.options(req.options);
    if req.items.is_empty() {
        return Err(api_error(AggrError::EmptyOrders));
    }
    // market makers never take part in a batch, so only the items themselves are checked
    let item_opts = QuoteOptions {
        rfq: None,
        ..opts.clone()
    };
    let mut plans: Vec<Option<OptimizerResult>> = vec![None; req.items.len()];
    let mut positions = Vec::new();
    let mut orders = Vec::new();
    let mut amounts = Vec::new();
    for (i, item) in req.items.into_iter().enumerate() {
        if let Err(err) = validate_quote_request(&item.orders, &item.maker_amount, &item_opts).into_result() {
            debug!(item = i, error = %err, "batch item rejected");
            continue;
        }
        positions.push(i);
        orders.push(item.orders);
        amounts.push(item.maker_amount);
    }
    if positions.is_empty() {
        return Ok(Json(BatchBuyApiResponse { plans }));
    }

    let planned = state
        .router
        .get_batch_market_buy_plan(&orders, &amounts, &opts)
        .await
        .map_err(api_error)?;
    for (pos, plan) in positions.into_iter().zip(planned) {
        plans[pos] = plan;
    }
    Ok(Json(BatchBuyApiResponse { plans }))
}
