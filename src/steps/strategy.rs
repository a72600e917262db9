//! Signal-generation step: convert AI insight into a trade signal.

use crate::error::PipelineError;
use crate::graph::StepId;
use crate::models::{RunState, TradeAction, TradeSignal};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Confidence required to act at all.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;
/// Sentiment at or above which a confident insight becomes a buy.
pub const SENTIMENT_THRESHOLD_BUY: f64 = 0.3;
/// Sentiment at or below which a confident insight becomes a sell.
pub const SENTIMENT_THRESHOLD_SELL: f64 = -0.3;
/// Static placeholder sizing: 5% of capital for buy/sell, 0% for hold.
const POSITION_SIZE_ACTIVE: f64 = 0.05;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub struct StrategyStep;

#[async_trait]
impl Step for StrategyStep {
    fn id(&self) -> StepId {
        StepId::GenerateSignal
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        // Absence of the insight here is a wiring bug, not a data gap:
        // the analysis step always writes one.
        let insight = state.gpt_insight.as_ref().ok_or(PipelineError::MissingInput {
            step: "generate_signal",
            field: "gpt_insight",
        })?;

        let confidence = round2(insight.confidence);
        let sentiment = round2(insight.sentiment_score);

        let action = if confidence >= CONFIDENCE_THRESHOLD {
            if sentiment >= SENTIMENT_THRESHOLD_BUY {
                TradeAction::Buy
            } else if sentiment <= SENTIMENT_THRESHOLD_SELL {
                TradeAction::Sell
            } else {
                TradeAction::Hold
            }
        } else {
            // Low confidence holds unconditionally.
            TradeAction::Hold
        };

        // Deterministic concatenation of the decision inputs, kept for
        // auditability.
        let reasoning = format!(
            "Action: {} - Confidence: {}, Sentiment: {}, Summary: {}",
            action.to_string().to_uppercase(),
            confidence,
            sentiment,
            insight.summary
        );

        let position_size = match action {
            TradeAction::Buy | TradeAction::Sell => POSITION_SIZE_ACTIVE,
            TradeAction::Hold => 0.0,
        };

        let signal = TradeSignal::new(action, reasoning, confidence, Some(position_size));
        info!(
            run_id = %state.run_id,
            action = %signal.action,
            confidence = signal.confidence,
            "generated trade signal"
        );
        state.trade_signal = Some(signal);
        Ok(state)
    }
}
