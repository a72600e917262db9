//! Intent classification step.
//!
//! Delegates to the language-model port with a fixed instruction prompt
//! over the closed intent set, validates the returned label, then applies
//! the deterministic keyword override after the model call (never before,
//! so model-derived and rule-derived behavior stay independently
//! testable). Any collaborator failure degrades to `unknown`.

use crate::graph::StepId;
use crate::models::{Intent, RunState};
use crate::ports::LanguageModelPort;
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Phrases that force `stock_insight` over to `report_request`.
const TOP_GAINERS_PHRASES: &[&str] = &[
    "top gainers",
    "most gained",
    "high growth",
    "best performing",
    "top performing",
    "strong stocks",
    "positive return",
    "top 5 gainers",
    "nasdaq gainers",
    "top stocks today",
    "best stocks today",
];

const INTENT_PROMPT: &str = r#"You are a professional trading assistant AI. Classify the user's query into one of the following categories used for routing inside a trading pipeline:

- report_request -> Requests trading summary or overview
- recovery_guidance -> Questions about recovering from losses
- budget_allocation -> Queries with limited capital or budget
- general_advice -> Generic investing or company comparison
- stock_insight -> Seeks company-specific data (e.g. price, volume, market cap)
- technical_analysis -> Seeks indicators like RSI, MACD, Bollinger Bands
- risk_assessment -> Questions about volatility, risk, or Sharpe ratio
- portfolio_guidance -> Help managing or rebalancing user portfolio
- macro_trend -> Asks about market-wide trends or economic effects
- unknown -> Use only if none of the above apply

Instructions:
1. Analyze the user question.
2. Select one most appropriate label.
3. Output only the label (lowercase), nothing else.

User question:
"{query}"
"#;

/// Deterministic post-model override: a `stock_insight` label on a query
/// that is really asking for top gainers is remapped to `report_request`.
pub fn apply_keyword_override(intent: Intent, query: &str) -> Intent {
    if intent == Intent::StockInsight {
        let lowered = query.to_lowercase();
        if TOP_GAINERS_PHRASES.iter().any(|p| lowered.contains(p)) {
            return Intent::ReportRequest;
        }
    }
    intent
}

pub struct IntentClassifierStep {
    llm: Arc<dyn LanguageModelPort>,
}

impl IntentClassifierStep {
    pub fn new(llm: Arc<dyn LanguageModelPort>) -> Self {
        Self { llm }
    }

    async fn classify(&self, query: &str) -> Result<Intent> {
        let prompt = INTENT_PROMPT.replace("{query}", query);
        let response = self.llm.complete(&prompt).await?;
        let label = response.trim().to_lowercase();
        if label.is_empty() {
            return Err(crate::error::PipelineError::Collaborator(
                "language model returned empty intent label".to_string(),
            ));
        }
        Ok(Intent::from_label(&label))
    }
}

#[async_trait]
impl Step for IntentClassifierStep {
    fn id(&self) -> StepId {
        StepId::ClassifyIntent
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        if state.user_query.trim().is_empty() {
            return Err(crate::error::PipelineError::MissingInput {
                step: "classify_intent",
                field: "user_query",
            });
        }

        let intent = match self.classify(&state.user_query).await {
            Ok(intent) => intent,
            Err(e) => {
                error!(run_id = %state.run_id, error = %e, "intent classification failed");
                Intent::Unknown
            }
        };

        let intent = apply_keyword_override(intent, &state.user_query);

        info!(run_id = %state.run_id, intent = %intent, "detected intent");
        state.intent = Some(intent);
        Ok(state)
    }
}
