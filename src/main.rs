// Service binary for liquidity-router
// Loads configuration, wires the sampler, market-maker client and router,
// serves the quoting HTTP API and shuts down on ctrl-c
//
// Numan Thabit 2025 Nov

use anyhow::{anyhow, Context, Result};
use liquidity_router::config::{AppConfig, EngineConfig, QuoteOptions};
use liquidity_router::router::{create_api_router, Router};
use liquidity_router::sampler::QuoteSampler;
use liquidity_router::transport::JsonRpcProbeExecutor;
use liquidity_router::venues::HttpQuoteProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal router error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    let engine = Arc::new(config.engine_config().context("build engine configuration")?);
    let defaults = config
        .default_quote_options()
        .context("build default quote options")?;

    let executor = Arc::new(JsonRpcProbeExecutor::new(config.sampler_endpoint.clone()));
    let sampler = Arc::new(QuoteSampler::new(executor, Arc::clone(&engine)));

    let makers = config
        .rfq_endpoint_urls()
        .context("parse market-maker endpoints")?;
    let mut router = Router::new(sampler, Arc::clone(&engine));
    if makers.is_empty() {
        warn!("no market-maker endpoints configured; RFQ liquidity disabled");
    } else {
        info!(makers = makers.len(), "market-maker quote client initialized");
        router = router.with_quote_provider(Arc::new(HttpQuoteProvider::new(
            makers,
            engine.rfq_timeout,
        )));
    }

    let app = App {
        config: Arc::new(config),
        engine,
        router: Arc::new(router),
    };
    app.run(defaults).await
}

struct App {
    config: Arc<AppConfig>,
    engine: Arc<EngineConfig>,
    router: Arc<Router>,
}

impl App {
    async fn run(self, defaults: QuoteOptions) -> Result<()> {
        let api_addr: SocketAddr = self
            .config
            .listen_addr()
            .parse()
            .with_context(|| format!("parse listen address {}", self.config.listen_addr()))?;

        info!(
            address = %api_addr,
            sampler = %self.config.sampler_endpoint,
            settlement_token = %self.engine.settlement_token,
            probe_timeout_ms = self.engine.probe_timeout.as_millis() as u64,
            sell_sources = self.engine.sell_sources.sources().len(),
            buy_sources = self.engine.buy_sources.sources().len(),
            "liquidity router online"
        );

        let api_router = create_api_router(Arc::clone(&self.router), defaults).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );
        let listener = tokio::net::TcpListener::bind(&api_addr)
            .await
            .with_context(|| format!("bind API server address {api_addr}"))?;

        let api_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api_router).await {
                warn!(error = %e, "API server error");
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!(
                        settlement_token = %self.engine.settlement_token,
                        fee_sources = self.engine.fee_sources.sources().len(),
                        "router heartbeat"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, exiting");
                    break;
                }
            }
        }
        api_handle.abort();
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
