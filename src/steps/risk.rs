//! Risk-assessment direct-answer step.
//!
//! Computes annualized volatility and Sharpe ratio from a year of daily
//! closes, and reads beta from the company overview. Series shorter than
//! the minimum sample report both statistics as 0.0 rather than implying
//! precision that isn't there.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::{MarketDataPort, PriceHistoryPort};
use crate::steps::{resolve_symbol, Step};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

const APOLOGY: &str =
    "Sorry, I couldn't assess risk for that company. Please mention a ticker symbol.";

const HISTORY_PERIOD_DAYS: u32 = 365;
const HISTORY_INTERVAL: &str = "1d";
/// Minimum number of closes required for the statistics.
const MIN_SAMPLE: usize = 30;
/// Trading days used to annualize daily figures.
const TRADING_DAYS: f64 = 252.0;
/// Annual risk-free rate assumed for the Sharpe ratio.
const RISK_FREE_RATE: f64 = 0.03;

fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Annualized volatility over a close series; 0.0 under the minimum sample.
pub fn annualized_volatility(closes: &[f64]) -> f64 {
    if closes.len() < MIN_SAMPLE {
        return 0.0;
    }
    stdev(&daily_returns(closes)) * TRADING_DAYS.sqrt()
}

/// Annualized Sharpe ratio over a close series; 0.0 under the minimum
/// sample or when the return series has no spread.
pub fn sharpe_ratio(closes: &[f64]) -> f64 {
    if closes.len() < MIN_SAMPLE {
        return 0.0;
    }
    let returns = daily_returns(closes);
    let sd = stdev(&returns);
    if sd == 0.0 {
        return 0.0;
    }
    let daily_risk_free = RISK_FREE_RATE / TRADING_DAYS;
    let mean_excess =
        returns.iter().map(|r| r - daily_risk_free).sum::<f64>() / returns.len() as f64;
    mean_excess / sd * TRADING_DAYS.sqrt()
}

pub struct RiskAssessmentStep {
    prices: Arc<dyn PriceHistoryPort>,
    market: Arc<dyn MarketDataPort>,
}

impl RiskAssessmentStep {
    pub fn new(prices: Arc<dyn PriceHistoryPort>, market: Arc<dyn MarketDataPort>) -> Self {
        Self { prices, market }
    }
}

#[async_trait]
impl Step for RiskAssessmentStep {
    fn id(&self) -> StepId {
        StepId::RiskAssessment
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let Some(symbol) = resolve_symbol(&state) else {
            error!(run_id = %state.run_id, "no symbol available for risk assessment");
            state.user_response = Some(APOLOGY.to_string());
            return Ok(state);
        };

        let closes: Vec<f64> = match self
            .prices
            .price_history(&symbol, HISTORY_PERIOD_DAYS, HISTORY_INTERVAL)
            .await
        {
            Ok(points) => points.iter().map(|p| p.close).collect(),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "price history lookup failed");
                Vec::new()
            }
        };

        let beta = match self.market.overview(&symbol).await {
            Ok(overview) => overview.beta,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "overview lookup failed");
                None
            }
        };

        let volatility = annualized_volatility(&closes);
        let sharpe = sharpe_ratio(&closes);

        let response = format!(
            "Risk profile for {}:\n\
             Annualized Volatility: {:.4}\n\
             Sharpe Ratio: {:.4}\n\
             Beta: {}",
            symbol,
            volatility,
            sharpe,
            beta.map(|b| format!("{:.2}", b))
                .unwrap_or_else(|| "N/A".to_string()),
        );

        info!(
            run_id = %state.run_id,
            symbol = %symbol,
            samples = closes.len(),
            volatility,
            "risk assessment rendered"
        );
        state.user_response = Some(response);
        Ok(state)
    }
}
