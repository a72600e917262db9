//! Report step: the shared terminal for the trading and top-movers
//! branches.
//!
//! Unknown intent short-circuits to a static refusal without touching any
//! collaborator. Otherwise the step composes the collected movers table
//! and insight into a prompt, asks the language model for a user-facing
//! answer, and falls back to a static apology when the model fails or
//! returns nothing.

use crate::graph::StepId;
use crate::models::{Intent, RunState};
use crate::ports::LanguageModelPort;
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

pub const REFUSAL: &str = "Sorry, I can only help with trading-related questions.";
const APOLOGY: &str =
    "Sorry, I couldn't generate a market report right now. Please try again later.";

pub struct ReportStep {
    llm: Arc<dyn LanguageModelPort>,
}

impl ReportStep {
    pub fn new(llm: Arc<dyn LanguageModelPort>) -> Self {
        Self { llm }
    }

    fn build_prompt(state: &RunState) -> String {
        let mut prompt = String::from(
            "You are a professional trading assistant. Write a concise, friendly answer to the user's question using only the data below. Do not invent numbers.\n",
        );

        prompt.push_str(&format!("\nUser question: {}\n", state.user_query));

        if let Some(movers) = state.top_movers.as_deref() {
            if !movers.is_empty() {
                prompt.push_str("\n# Movers:\n");
                for m in movers {
                    prompt.push_str(&format!(
                        "- {} ({}) | Price: ${:.2} | Change: {:.2}%\n",
                        m.symbol, m.name, m.price, m.percent_change
                    ));
                }
            }
        }

        if let Some(insight) = state.gpt_insight.as_ref() {
            prompt.push_str(&format!(
                "\n# Market Insight:\nSentiment: {:.2} (confidence {:.2})\nSummary: {}\n",
                insight.sentiment_score, insight.confidence, insight.summary
            ));
            if !insight.bullish_indicators.is_empty() {
                prompt.push_str(&format!(
                    "Bullish: {}\n",
                    insight.bullish_indicators.join(", ")
                ));
            }
            if !insight.bearish_indicators.is_empty() {
                prompt.push_str(&format!(
                    "Bearish: {}\n",
                    insight.bearish_indicators.join(", ")
                ));
            }
            if let Some(forecast) = insight.forecast_summary.as_deref() {
                prompt.push_str(&format!("Forecast: {}\n", forecast));
            }
        }

        if let Some(signal) = state.trade_signal.as_ref() {
            prompt.push_str(&format!(
                "\n# Generated Signal:\nAction: {} (confidence {:.2})\n",
                signal.action, signal.confidence
            ));
        }

        prompt
    }
}

#[async_trait]
impl Step for ReportStep {
    fn id(&self) -> StepId {
        StepId::Report
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        // The refusal path must make zero collaborator calls.
        if matches!(state.intent, None | Some(Intent::Unknown)) {
            info!(run_id = %state.run_id, "unknown intent, refusing");
            state.user_response = Some(REFUSAL.to_string());
            return Ok(state);
        }

        if state.gpt_insight.is_none() {
            error!(run_id = %state.run_id, "no insight available for report");
            state.user_response = Some(APOLOGY.to_string());
            return Ok(state);
        }

        let prompt = Self::build_prompt(&state);
        let response = match self.llm.complete(&prompt).await {
            Ok(text) => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    error!(run_id = %state.run_id, "model returned empty report");
                    APOLOGY.to_string()
                } else {
                    info!(run_id = %state.run_id, chars = trimmed.len(), "report generated");
                    trimmed
                }
            }
            Err(e) => {
                error!(run_id = %state.run_id, error = %e, "report generation failed");
                APOLOGY.to_string()
            }
        };

        state.user_response = Some(response);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GptInsight;
    use crate::ports::mock::MockLanguageModel;

    fn analyzed_state(intent: Intent) -> RunState {
        let mut state = RunState::new("AAPL", "how is the market?");
        state.intent = Some(intent);
        state.gpt_insight = Some(GptInsight::new(
            0.4,
            "steady uptrend".into(),
            vec!["AAPL".into()],
            vec![],
            0.7,
        ));
        state
    }

    #[tokio::test]
    async fn test_unknown_intent_refuses_without_model_call() {
        let llm = Arc::new(MockLanguageModel::new("should never be used"));
        let step = ReportStep::new(llm.clone());

        let mut state = RunState::new("AAPL", "write me a poem");
        state.intent = Some(Intent::Unknown);
        let state = step.run(state).await.unwrap();

        assert_eq!(state.user_response.as_deref(), Some(REFUSAL));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_insight_yields_apology() {
        let llm = Arc::new(MockLanguageModel::new("unused"));
        let step = ReportStep::new(llm.clone());

        let mut state = RunState::new("AAPL", "market report please");
        state.intent = Some(Intent::ReportRequest);
        let state = step.run(state).await.unwrap();

        assert_eq!(state.user_response.as_deref(), Some(APOLOGY));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_text_becomes_response_trimmed() {
        let llm = Arc::new(MockLanguageModel::new("  The market looks steady today.  \n"));
        let step = ReportStep::new(llm);
        let state = step.run(analyzed_state(Intent::ReportRequest)).await.unwrap();
        assert_eq!(
            state.user_response.as_deref(),
            Some("The market looks steady today.")
        );
    }

    #[tokio::test]
    async fn test_empty_model_text_yields_apology() {
        let llm = Arc::new(MockLanguageModel::new("   "));
        let step = ReportStep::new(llm);
        let state = step.run(analyzed_state(Intent::ReportRequest)).await.unwrap();
        assert_eq!(state.user_response.as_deref(), Some(APOLOGY));
    }

    #[test]
    fn test_prompt_includes_collected_data() {
        let mut state = analyzed_state(Intent::ReportRequest);
        state.gpt_insight = Some(
            state
                .gpt_insight
                .take()
                .unwrap()
                .with_forecast_summary("mild upside expected".into()),
        );
        let prompt = ReportStep::build_prompt(&state);
        assert!(prompt.contains("how is the market?"));
        assert!(prompt.contains("steady uptrend"));
        assert!(prompt.contains("mild upside expected"));
    }
}
