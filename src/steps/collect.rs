//! Data-collection steps for the trading branch: news and price history.
//!
//! Both degrade to an empty sequence on collaborator failure; an empty
//! result is a valid state, not an error.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::{NewsPort, PriceHistoryPort};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

const NEWS_LOOKBACK_DAYS: u32 = 1;
const PRICE_PERIOD_DAYS: u32 = 7;
const PRICE_INTERVAL: &str = "1h";

pub struct FetchNewsStep {
    news: Arc<dyn NewsPort>,
}

impl FetchNewsStep {
    pub fn new(news: Arc<dyn NewsPort>) -> Self {
        Self { news }
    }
}

#[async_trait]
impl Step for FetchNewsStep {
    fn id(&self) -> StepId {
        StepId::FetchNews
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let symbol = state.symbol.to_uppercase();
        let articles = match self.news.latest_news(&symbol, NEWS_LOOKBACK_DAYS).await {
            Ok(articles) => {
                info!(
                    run_id = %state.run_id,
                    symbol = %symbol,
                    count = articles.len(),
                    "fetched news articles"
                );
                articles
            }
            Err(e) => {
                error!(run_id = %state.run_id, symbol = %symbol, error = %e, "news fetch failed");
                Vec::new()
            }
        };
        state.raw_news = Some(articles);
        Ok(state)
    }
}

pub struct FetchPricesStep {
    prices: Arc<dyn PriceHistoryPort>,
}

impl FetchPricesStep {
    pub fn new(prices: Arc<dyn PriceHistoryPort>) -> Self {
        Self { prices }
    }
}

#[async_trait]
impl Step for FetchPricesStep {
    fn id(&self) -> StepId {
        StepId::FetchPrices
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let symbol = state.symbol.to_uppercase();
        let points = match self
            .prices
            .price_history(&symbol, PRICE_PERIOD_DAYS, PRICE_INTERVAL)
            .await
        {
            Ok(points) => {
                info!(
                    run_id = %state.run_id,
                    symbol = %symbol,
                    count = points.len(),
                    "fetched price history"
                );
                points
            }
            Err(e) => {
                error!(run_id = %state.run_id, symbol = %symbol, error = %e, "price fetch failed");
                Vec::new()
            }
        };
        state.price_data = Some(points);
        Ok(state)
    }
}
