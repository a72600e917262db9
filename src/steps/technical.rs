//! Technical-analysis direct-answer step.
//!
//! Pulls RSI, MACD, the 50/200 SMAs and Bollinger Bands for the resolved
//! symbol and renders a tagged plain-text summary. Each indicator that
//! fails or comes back empty renders "N/A" on its own line; only a
//! missing symbol degrades the whole step to the apology.

use crate::graph::StepId;
use crate::models::RunState;
use crate::ports::IndicatorPort;
use crate::steps::{resolve_symbol, Step};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

const APOLOGY: &str =
    "Sorry, I couldn't run a technical analysis. Please mention a ticker symbol.";

const RSI_PERIOD: u32 = 14;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const SMA_SHORT: u32 = 50;
const SMA_LONG: u32 = 200;

fn rsi_line(rsi: Option<f64>) -> String {
    match rsi {
        Some(v) if v > RSI_OVERBOUGHT => format!("RSI({}): {:.2} (overbought)", RSI_PERIOD, v),
        Some(v) if v < RSI_OVERSOLD => format!("RSI({}): {:.2} (oversold)", RSI_PERIOD, v),
        Some(v) => format!("RSI({}): {:.2} (neutral)", RSI_PERIOD, v),
        None => format!("RSI({}): N/A", RSI_PERIOD),
    }
}

pub struct TechnicalAnalysisStep {
    indicators: Arc<dyn IndicatorPort>,
}

impl TechnicalAnalysisStep {
    pub fn new(indicators: Arc<dyn IndicatorPort>) -> Self {
        Self { indicators }
    }
}

#[async_trait]
impl Step for TechnicalAnalysisStep {
    fn id(&self) -> StepId {
        StepId::TechnicalAnalysis
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let Some(symbol) = resolve_symbol(&state) else {
            error!(run_id = %state.run_id, "no symbol available for technical analysis");
            state.user_response = Some(APOLOGY.to_string());
            return Ok(state);
        };

        let rsi = self
            .indicators
            .rsi(&symbol, RSI_PERIOD)
            .await
            .unwrap_or_else(|e| {
                warn!(symbol = %symbol, error = %e, "rsi lookup failed");
                None
            });

        let macd = self.indicators.macd(&symbol).await.unwrap_or_else(|e| {
            warn!(symbol = %symbol, error = %e, "macd lookup failed");
            Default::default()
        });

        let sma_short = self
            .indicators
            .sma(&symbol, SMA_SHORT)
            .await
            .unwrap_or_else(|e| {
                warn!(symbol = %symbol, error = %e, "sma lookup failed");
                None
            });
        let sma_long = self
            .indicators
            .sma(&symbol, SMA_LONG)
            .await
            .unwrap_or_else(|e| {
                warn!(symbol = %symbol, error = %e, "sma lookup failed");
                None
            });

        let bollinger = self.indicators.bollinger(&symbol).await.unwrap_or_else(|e| {
            warn!(symbol = %symbol, error = %e, "bollinger lookup failed");
            Default::default()
        });

        let mut lines = vec![format!("Technical analysis for {}:", symbol)];
        lines.push(rsi_line(rsi));

        lines.push(match (macd.macd, macd.signal) {
            (Some(m), Some(s)) => format!("MACD: {:.2} | Signal: {:.2}", m, s),
            _ => "MACD: N/A".to_string(),
        });

        lines.push(match sma_short {
            Some(v) => format!("SMA({}): {:.2}", SMA_SHORT, v),
            None => format!("SMA({}): N/A", SMA_SHORT),
        });
        lines.push(match sma_long {
            Some(v) => format!("SMA({}): {:.2}", SMA_LONG, v),
            None => format!("SMA({}): N/A", SMA_LONG),
        });

        lines.push(match (bollinger.upper, bollinger.lower, bollinger.last_price) {
            (Some(upper), Some(lower), Some(price)) => {
                let position = if price > upper {
                    "above upper band"
                } else if price < lower {
                    "below lower band"
                } else {
                    "within normal range"
                };
                format!(
                    "Bollinger Bands: {:.2} / {:.2} | Last: {:.2} ({})",
                    upper, lower, price, position
                )
            }
            _ => "Bollinger Bands: N/A".to_string(),
        });

        info!(run_id = %state.run_id, symbol = %symbol, "technical analysis rendered");
        state.user_response = Some(lines.join("\n"));
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::MockIndicators;
    use crate::ports::{BollingerReading, MacdReading};

    #[tokio::test]
    async fn test_all_indicators_rendered() {
        let step = TechnicalAnalysisStep::new(Arc::new(MockIndicators));
        let state = step
            .run(RunState::new("AAPL", "show me AAPL indicators"))
            .await
            .unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("RSI(14): 54.20 (neutral)"));
        assert!(response.contains("MACD: 1.35 | Signal: 1.10"));
        assert!(response.contains("SMA(50): 161.50"));
        assert!(response.contains("SMA(200): 148.00"));
        assert!(response.contains("within normal range"));
    }

    #[tokio::test]
    async fn test_missing_symbol_degrades_to_apology() {
        let step = TechnicalAnalysisStep::new(Arc::new(MockIndicators));
        let state = step.run(RunState::new("", "indicators?")).await.unwrap();
        assert_eq!(state.user_response.as_deref(), Some(APOLOGY));
    }

    struct EmptyIndicators;

    #[async_trait]
    impl IndicatorPort for EmptyIndicators {
        async fn rsi(&self, _: &str, _: u32) -> Result<Option<f64>> {
            Ok(None)
        }

        async fn macd(&self, _: &str) -> Result<MacdReading> {
            Ok(MacdReading::default())
        }

        async fn sma(&self, _: &str, _: u32) -> Result<Option<f64>> {
            Ok(None)
        }

        async fn bollinger(&self, _: &str) -> Result<BollingerReading> {
            Ok(BollingerReading::default())
        }
    }

    #[tokio::test]
    async fn test_empty_indicators_render_not_available_lines() {
        let step = TechnicalAnalysisStep::new(Arc::new(EmptyIndicators));
        let state = step.run(RunState::new("AAPL", "indicators?")).await.unwrap();
        let response = state.user_response.unwrap();
        assert!(response.contains("RSI(14): N/A"));
        assert!(response.contains("MACD: N/A"));
        assert!(response.contains("Bollinger Bands: N/A"));
    }

    #[test]
    fn test_rsi_tags() {
        assert!(rsi_line(Some(75.0)).contains("overbought"));
        assert!(rsi_line(Some(25.0)).contains("oversold"));
        assert!(rsi_line(Some(50.0)).contains("neutral"));
        assert!(rsi_line(None).contains("N/A"));
    }
}
