//! AI-analysis steps: turn collected market data into a `GptInsight`.
//!
//! `MarketAnalystStep` works from news + price history (trading branch);
//! `MoversAnalystStep` works from the top-movers table. Both hold the
//! same fallback policy: on any collaborator or parse failure the insight
//! is replaced by the documented neutral object, so `gpt_insight` is never
//! left unset after either step runs.

use crate::graph::StepId;
use crate::models::{GptInsight, RunState};
use crate::ports::{extract_json_object, LanguageModelPort};
use crate::steps::Step;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

const NEUTRAL_SUMMARY: &str = "Market analysis unavailable.";

/// How many trailing price points the prompt includes.
const PRICE_CONTEXT_POINTS: usize = 5;

fn insight_prompt_header() -> &'static str {
    r#"You're a financial AI analyst. Analyze the following market data and provide a JSON insight report.

## Your Task:
Return the following in JSON format:
{
  "sentiment_score": -1 to 1 (float),
  "summary": "short market insight",
  "bullish_indicators": [list of string],
  "bearish_indicators": [list of string],
  "confidence": 0 to 1 (float)
}
"#
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Coerce a model completion into a clamped insight. Empty text and
/// missing required fields are parse failures; the caller substitutes
/// the neutral fallback.
pub fn parse_insight(response: &str) -> Result<GptInsight> {
    if response.trim().is_empty() {
        return Err(crate::error::PipelineError::Collaborator(
            "language model returned empty analysis".to_string(),
        ));
    }

    let value = extract_json_object(response)?;

    let sentiment = value
        .get("sentiment_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            crate::error::PipelineError::Parse("insight missing sentiment_score".to_string())
        })?;
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            crate::error::PipelineError::Parse("insight missing confidence".to_string())
        })?;
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut insight = GptInsight::new(
        sentiment,
        summary,
        string_list(&value, "bullish_indicators"),
        string_list(&value, "bearish_indicators"),
        confidence,
    );

    if let Some(forecast) = value.get("forecast_summary").and_then(Value::as_str) {
        insight = insight.with_forecast_summary(forecast.to_string());
    }
    let fit = string_list(&value, "portfolio_fit");
    if !fit.is_empty() {
        insight = insight.with_portfolio_fit(fit);
    }

    Ok(insight)
}

async fn analyze_with_fallback(
    llm: &Arc<dyn LanguageModelPort>,
    prompt: &str,
    state: &RunState,
    step: &'static str,
) -> GptInsight {
    let insight = match llm.complete(prompt).await {
        Ok(response) => parse_insight(&response),
        Err(e) => Err(e),
    };

    match insight {
        Ok(insight) => {
            info!(
                run_id = %state.run_id,
                step,
                sentiment = insight.sentiment_score,
                confidence = insight.confidence,
                "generated market insight"
            );
            insight
        }
        Err(e) => {
            error!(run_id = %state.run_id, step, error = %e, "analysis failed, using neutral fallback");
            GptInsight::neutral(NEUTRAL_SUMMARY)
        }
    }
}

pub struct MarketAnalystStep {
    llm: Arc<dyn LanguageModelPort>,
}

impl MarketAnalystStep {
    pub fn new(llm: Arc<dyn LanguageModelPort>) -> Self {
        Self { llm }
    }

    fn build_prompt(state: &RunState) -> String {
        let mut prompt = String::from(insight_prompt_header());

        prompt.push_str("\n# Market News Summary:\n");
        match state.raw_news.as_deref() {
            Some(articles) if !articles.is_empty() => {
                for article in articles {
                    prompt.push_str("- ");
                    prompt.push_str(&article.summary);
                    prompt.push('\n');
                }
            }
            _ => prompt.push_str("- No recent news available.\n"),
        }

        prompt.push_str("\n# Recent Price Data:\n");
        match state.price_data.as_deref() {
            Some(points) if !points.is_empty() => {
                let tail = &points[points.len().saturating_sub(PRICE_CONTEXT_POINTS)..];
                for point in tail {
                    prompt.push_str(&format!(
                        "{} | Close: {}\n",
                        point.timestamp.format("%Y-%m-%d %H:%M"),
                        point.close
                    ));
                }
            }
            _ => prompt.push_str("No price history available.\n"),
        }

        prompt
    }
}

#[async_trait]
impl Step for MarketAnalystStep {
    fn id(&self) -> StepId {
        StepId::AnalyzeMarket
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let prompt = Self::build_prompt(&state);
        let insight = analyze_with_fallback(&self.llm, &prompt, &state, "analyze_market").await;
        state.gpt_insight = Some(insight);
        Ok(state)
    }
}

pub struct MoversAnalystStep {
    llm: Arc<dyn LanguageModelPort>,
}

impl MoversAnalystStep {
    pub fn new(llm: Arc<dyn LanguageModelPort>) -> Self {
        Self { llm }
    }

    fn build_prompt(state: &RunState) -> String {
        let mut prompt = String::from(insight_prompt_header());

        prompt.push_str("\n# Today's Movers:\n");
        match state.top_movers.as_deref() {
            Some(movers) if !movers.is_empty() => {
                for m in movers {
                    prompt.push_str(&format!(
                        "- {} ({}) | Price: ${:.2} | Change: {:.2}%\n",
                        m.symbol, m.name, m.price, m.percent_change
                    ));
                }
            }
            _ => prompt.push_str("- No mover data available.\n"),
        }

        prompt
    }
}

#[async_trait]
impl Step for MoversAnalystStep {
    fn id(&self) -> StepId {
        StepId::AnalyzeMovers
    }

    async fn run(&self, mut state: RunState) -> Result<RunState> {
        let prompt = Self::build_prompt(&state);
        let insight = analyze_with_fallback(&self.llm, &prompt, &state, "analyze_movers").await;
        state.gpt_insight = Some(insight);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockLanguageModel, MockNews, MockPrices};
    use crate::ports::{NewsPort, PriceHistoryPort};

    fn insight_json(sentiment: f64, confidence: f64) -> String {
        format!(
            r#"Here you go:
{{"sentiment_score": {}, "summary": "steady", "bullish_indicators": ["AAPL"], "bearish_indicators": [], "confidence": {}}}"#,
            sentiment, confidence
        )
    }

    async fn collected_state() -> RunState {
        let mut state = RunState::new("AAPL", "full report please");
        state.raw_news = Some(
            MockNews::sample("AAPL")
                .latest_news("AAPL", 1)
                .await
                .unwrap(),
        );
        state.price_data = Some(
            MockPrices::trending_to(190.0)
                .price_history("AAPL", 7, "1h")
                .await
                .unwrap(),
        );
        state
    }

    #[tokio::test]
    async fn test_insight_parsed_from_fenced_response() {
        let llm = Arc::new(MockLanguageModel::new(insight_json(0.5, 0.8)));
        let step = MarketAnalystStep::new(llm);
        let state = step.run(collected_state().await).await.unwrap();
        let insight = state.gpt_insight.unwrap();
        assert_eq!(insight.sentiment_score, 0.5);
        assert_eq!(insight.confidence, 0.8);
        assert_eq!(insight.bullish_indicators, vec!["AAPL".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_model_text_yields_neutral_fallback() {
        // Empty completion text is a failure-triggering condition.
        let llm = Arc::new(MockLanguageModel::new(""));
        let step = MarketAnalystStep::new(llm);
        let state = step.run(collected_state().await).await.unwrap();
        let insight = state.gpt_insight.unwrap();
        assert_eq!(insight.sentiment_score, 0.0);
        assert_eq!(insight.confidence, 0.0);
        assert!(insight.bullish_indicators.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_response_yields_neutral_fallback() {
        let llm = Arc::new(MockLanguageModel::new("the market feels bullish"));
        let step = MarketAnalystStep::new(llm);
        let state = step.run(collected_state().await).await.unwrap();
        let insight = state.gpt_insight.unwrap();
        assert_eq!(insight.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_out_of_range_model_values_are_clamped() {
        let llm = Arc::new(MockLanguageModel::new(insight_json(4.0, 9.0)));
        let step = MarketAnalystStep::new(llm);
        let state = step.run(collected_state().await).await.unwrap();
        let insight = state.gpt_insight.unwrap();
        assert_eq!(insight.sentiment_score, 1.0);
        assert_eq!(insight.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_movers_analyst_sets_insight_without_news() {
        let llm = Arc::new(MockLanguageModel::new(insight_json(-0.2, 0.7)));
        let step = MoversAnalystStep::new(llm);
        // No movers collected at all; the step still writes an insight.
        let state = step.run(RunState::new("AAPL", "q")).await.unwrap();
        assert!(state.gpt_insight.is_some());
    }

    #[test]
    fn test_parse_insight_requires_core_fields() {
        assert!(parse_insight(r#"{"summary": "no numbers"}"#).is_err());
        assert!(parse_insight("").is_err());
    }
}
