// Market-maker quote client
// This file implements the HTTP quote service used by the service binary: every
// configured maker is asked concurrently and a slow or failing maker simply
// contributes no quotes
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::market::{MarketMakerQuote, Side};
use crate::metrics::RFQ_MAKER_ERRORS;
use crate::venues::adapter::{QuoteProvider, QuoteRequest};
use async_trait::async_trait;
use futures::future::join_all;
use num::BigUint;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpQuoteProvider {
    http: Client,
    makers: Vec<Url>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MakerResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    maker: Option<String>,
    maker_token: String,
    taker_token: String,
    maker_amount: String,
    taker_amount: String,
}

#[derive(Debug, Clone, Copy)]
enum QuoteKind {
    Indicative,
    Firm,
}

impl QuoteKind {
    fn path(self) -> &'static str {
        match self {
            QuoteKind::Indicative => "price",
            QuoteKind::Firm => "quote",
        }
    }
}

impl HttpQuoteProvider {
    pub fn new(makers: Vec<Url>, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            makers,
            timeout,
        }
    }

    async fn ask_all(
        &self,
        req: &QuoteRequest,
        kind: QuoteKind,
        taker_address: Option<&str>,
    ) -> Vec<MarketMakerQuote> {
        let asks = self.makers.iter().map(|maker| async move {
            let res = tokio::time::timeout(self.timeout, self.ask(maker, req, kind, taker_address))
                .await
                .unwrap_or_else(|_| Err(AggrError::Transport("maker timed out".to_string())));
            match res {
                Ok(quotes) => quotes,
                Err(err) => {
                    RFQ_MAKER_ERRORS.with_label_values(&[maker.as_str()]).inc();
                    warn!(maker = %maker, error = %err, "market maker quote failed; skipping");
                    Vec::new()
                }
            }
        });
        join_all(asks).await.into_iter().flatten().collect()
    }

    async fn ask(
        &self,
        maker: &Url,
        req: &QuoteRequest,
        kind: QuoteKind,
        taker_address: Option<&str>,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        let url = maker
            .join(kind.path())
            .map_err(|e| AggrError::Transport(format!("maker url: {e}")))?;

        let amount_key = match req.side {
            Side::Sell => "sellAmountBaseUnits",
            Side::Buy => "buyAmountBaseUnits",
        };
        let mut query: Vec<(&str, String)> = vec![
            ("sellTokenAddress", req.taker_token.clone()),
            ("buyTokenAddress", req.maker_token.clone()),
            (amount_key, req.amount.to_str_radix(10)),
            ("intentOnFilling", req.intent_on_filling.to_string()),
        ];
        if let Some(price) = &req.comparison_price {
            query.push(("comparisonPrice", format!("{}/{}", price.numer(), price.denom())));
        }
        if let Some(taker) = taker_address {
            query.push(("takerAddress", taker.to_string()));
        }

        let resp = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AggrError::Transport(format!("maker send: {e}")))?;
        if !resp.status().is_success() {
            return Err(AggrError::Provider(format!("http {}", resp.status())));
        }
        let body: Vec<MakerResponse> = resp
            .json()
            .await
            .map_err(|e| AggrError::Transport(format!("json parse: {e}")))?;

        let firm = matches!(kind, QuoteKind::Firm);
        let quotes: Vec<MarketMakerQuote> = body
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let quote = MarketMakerQuote {
                    id: r.id.unwrap_or_else(|| format!("{maker}#{i}")),
                    maker: r.maker.unwrap_or_else(|| maker.to_string()),
                    maker_token: r.maker_token.to_ascii_lowercase(),
                    taker_token: r.taker_token.to_ascii_lowercase(),
                    maker_amount: BigUint::from_str(&r.maker_amount).ok()?,
                    taker_amount: BigUint::from_str(&r.taker_amount).ok()?,
                    is_firm: firm,
                };
                // drop quotes for another pair
                (quote.maker_token == req.maker_token && quote.taker_token == req.taker_token)
                    .then_some(quote)
            })
            .collect();
        debug!(maker = %maker, quotes = quotes.len(), firm, "market maker responded");
        Ok(quotes)
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn request_indicative_quotes(
        &self,
        req: &QuoteRequest,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        Ok(self.ask_all(req, QuoteKind::Indicative, None).await)
    }

    async fn request_firm_quotes(
        &self,
        req: &QuoteRequest,
        taker_address: Option<&str>,
    ) -> Result<Vec<MarketMakerQuote>, AggrError> {
        let taker = taker_address.ok_or(AggrError::InvalidFirmQuoteRequest)?;
        Ok(self.ask_all(req, QuoteKind::Firm, Some(taker)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QuoteRequest {
        QuoteRequest {
            maker_token: "0xm".into(),
            taker_token: "0xt".into(),
            amount: BigUint::from(1u32),
            side: Side::Sell,
            comparison_price: None,
            intent_on_filling: false,
        }
    }

    #[tokio::test]
    async fn firm_quotes_need_a_taker() {
        let provider = HttpQuoteProvider::new(Vec::new(), Duration::from_millis(10));
        let err = provider.request_firm_quotes(&request(), None).await.unwrap_err();
        assert_eq!(err, AggrError::InvalidFirmQuoteRequest);
    }

    #[tokio::test]
    async fn no_makers_means_no_quotes() {
        let provider = HttpQuoteProvider::new(Vec::new(), Duration::from_millis(10));
        let quotes = provider.request_indicative_quotes(&request()).await.unwrap();
        assert!(quotes.is_empty());
    }
}
