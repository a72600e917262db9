//! Company-snapshot direct-answer step.
//!
//! Terminal branch: resolves the working symbol, pulls a quote and the
//! company overview, and renders a plain-text snapshot straight into
//! `user_response`. Missing fields render as "N/A"; a failed lookup
//! degrades to a static apology.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::MarketDataPort;
use crate::steps::{resolve_symbol, Step};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

const APOLOGY: &str =
    "Sorry, I couldn't find market data for that company. Please mention a ticker symbol.";

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "N/A".to_string())
}

fn fmt_opt_u64(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn fmt_market_cap(value: Option<f64>) -> String {
    value
        .map(|v| format!("${:.2}B", v / 1e9))
        .unwrap_or_else(|| "N/A".to_string())
}

pub struct StockInsightStep {
    market: Arc<dyn MarketDataPort>,
}

impl StockInsightStep {
    pub fn new(market: Arc<dyn MarketDataPort>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl Step for StockInsightStep {
    fn id(&self) -> StepId {
        StepId::StockInsight
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let Some(symbol) = resolve_symbol(&state) else {
            error!(run_id = %state.run_id, "no symbol available for stock insight");
            state.user_response = Some(APOLOGY.to_string());
            return Ok(state);
        };

        let quote = self.market.quote(&symbol).await;
        let overview = self.market.overview(&symbol).await;
        let (quote, overview) = match (quote, overview) {
            (Ok(quote), Ok(overview)) => (quote, overview),
            (Err(e), _) | (_, Err(e)) => {
                error!(run_id = %state.run_id, symbol = %symbol, error = %e, "stock lookup failed");
                state.user_response = Some(APOLOGY.to_string());
                return Ok(state);
            }
        };

        let name = overview.name.unwrap_or_else(|| symbol.clone());
        let response = format!(
            "{} ({})\n\
             Price: ${}\n\
             Change: {}%\n\
             Volume: {}\n\
             Market Cap: {}\n\
             P/E Ratio: {}\n\
             Dividend Yield: {}\n\
             Sector: {}",
            name,
            symbol,
            fmt_opt(quote.price),
            fmt_opt(quote.change_percent),
            fmt_opt_u64(quote.volume),
            fmt_market_cap(overview.market_cap),
            fmt_opt(overview.pe_ratio),
            fmt_opt(overview.dividend_yield),
            overview.sector.unwrap_or_else(|| "N/A".to_string()),
        );

        info!(run_id = %state.run_id, symbol = %symbol, "stock insight rendered");
        state.user_response = Some(response);
        Ok(state)
    }
}
