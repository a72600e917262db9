//! Trade-simulation step.
//!
//! This is a simulation boundary, not a real order: buy/sell signals
//! synthesize an `ExecutedTrade` at the most recent close (or a fixed
//! fallback price when no history is present); hold signals leave
//! `executed_trade` absent. The status is always `Executed`; the
//! `Rejected` variant is schema-reserved for a future rejection path.

use crate::error::PipelineError;
use crate::graph::StepId;
use crate::models::{ExecutedTrade, RunState, TradeAction, TradeStatus};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Fixed simulated order size.
const DEFAULT_TRADE_QUANTITY: f64 = 10.0;
/// Price used when no price history is available.
const FALLBACK_PRICE: f64 = 100.0;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub struct TradeExecutorStep;

#[async_trait]
impl Step for TradeExecutorStep {
    fn id(&self) -> StepId {
        StepId::ExecuteTrade
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let signal = state.trade_signal.as_ref().ok_or(PipelineError::MissingInput {
            step: "execute_trade",
            field: "trade_signal",
        })?;

        if signal.action == TradeAction::Hold {
            state.executed_trade = None;
            info!(run_id = %state.run_id, "hold signal, no trade simulated");
            return Ok(state);
        }

        let price = state
            .latest_close()
            .map(round2)
            .unwrap_or(FALLBACK_PRICE);

        let trade = ExecutedTrade {
            timestamp: Utc::now(),
            action: signal.action,
            symbol: state.symbol.clone(),
            quantity: DEFAULT_TRADE_QUANTITY,
            price,
            status: TradeStatus::Executed,
        };

        info!(
            run_id = %state.run_id,
            action = %trade.action,
            symbol = %trade.symbol,
            price = trade.price,
            "simulated trade execution"
        );
        state.executed_trade = Some(trade);
        Ok(state)
    }
}
