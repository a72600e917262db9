//! Collaborator ports
//!
//! Abstract capability interfaces the pipeline steps invoke. Only the
//! contract lives here; HTTP-backed implementations are in `providers`
//! and in-memory test doubles in `ports::mock`.

use crate::models::{NewsArticle, PricePoint};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod mock;

/// Language-model completion port.
///
/// May return empty text; every caller must treat that as a
/// failure-triggering condition. Callers locate a JSON object inside
/// free-form output via [`extract_json_object`] rather than expecting a
/// strict schema.
#[async_trait]
pub trait LanguageModelPort: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// News lookup port. An empty sequence is a valid, non-error response.
#[async_trait]
pub trait NewsPort: Send + Sync {
    async fn latest_news(&self, symbol: &str, lookback_days: u32) -> Result<Vec<NewsArticle>>;
}

/// Price-history port. An empty sequence signals unavailable history,
/// not an error.
#[async_trait]
pub trait PriceHistoryPort: Send + Sync {
    async fn price_history(
        &self,
        symbol: &str,
        period_days: u32,
        interval: &str,
    ) -> Result<Vec<PricePoint>>;
}

/// Real-time quote. Missing fields are `None` and render as "N/A".
#[derive(Debug, Clone, Default)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<u64>,
}

/// Company/ETF fundamentals. Missing fields are `None` and render as "N/A".
#[derive(Debug, Clone, Default)]
pub struct CompanyOverview {
    pub symbol: String,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub sector: Option<String>,
    pub beta: Option<f64>,
}

/// Quote/overview lookup port.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;
    async fn overview(&self, symbol: &str) -> Result<CompanyOverview>;
}

#[derive(Debug, Clone, Default)]
pub struct MacdReading {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BollingerReading {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
    pub last_price: Option<f64>,
}

/// Technical-indicator lookup port.
#[async_trait]
pub trait IndicatorPort: Send + Sync {
    async fn rsi(&self, symbol: &str, time_period: u32) -> Result<Option<f64>>;
    async fn macd(&self, symbol: &str) -> Result<MacdReading>;
    async fn sma(&self, symbol: &str, time_period: u32) -> Result<Option<f64>>;
    async fn bollinger(&self, symbol: &str) -> Result<BollingerReading>;
}

/// Latest observation of an economic data series.
#[derive(Debug, Clone)]
pub struct MacroObservation {
    pub series_id: String,
    pub date: String,
    pub value: String,
}

/// Macro-series lookup port (e.g. FRED series).
#[async_trait]
pub trait MacroSeriesPort: Send + Sync {
    async fn latest_observation(&self, series_id: &str) -> Result<MacroObservation>;
}

#[derive(Debug, Clone)]
pub struct EtfProfile {
    pub symbol: String,
    pub name: String,
    pub top_sector: String,
    pub expected_return: f64,
    pub risk_score: String,
}

/// ETF-profile lookup port.
#[async_trait]
pub trait EtfProfilePort: Send + Sync {
    async fn etf_profile(&self, symbol: &str) -> Result<EtfProfile>;
}

/// Capability bundle constructed once at startup and passed into the
/// pipeline builder. Replaces process-wide singleton clients so every
/// port can be substituted with a test double.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LanguageModelPort>,
    pub news: Arc<dyn NewsPort>,
    pub prices: Arc<dyn PriceHistoryPort>,
    pub market: Arc<dyn MarketDataPort>,
    pub indicators: Arc<dyn IndicatorPort>,
    pub macro_series: Arc<dyn MacroSeriesPort>,
    pub etf: Arc<dyn EtfProfilePort>,
}

/// Locate a JSON object inside free-form model output via a first-`{` /
/// last-`}` bracket scan. This lenient extraction is the documented
/// contract for consuming model completions; strict schema validation
/// happens after coercion into typed structs.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
    let start = text.find('{').ok_or_else(|| {
        crate::error::PipelineError::Parse("no JSON object found in model output".to_string())
    })?;
    let end = text.rfind('}').ok_or_else(|| {
        crate::error::PipelineError::Parse("unterminated JSON object in model output".to_string())
    })?;

    if end < start {
        return Err(crate::error::PipelineError::Parse(
            "malformed JSON object bounds in model output".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).map_err(|e| {
        crate::error::PipelineError::Parse(format!("model output is not valid JSON: {}", e))
    })?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_json_from_fenced_output() {
        let raw = "Sure, here is the report:\n```json\n{\"confidence\": 0.8}\n```\nDone.";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["confidence"], 0.8);
    }

    #[test]
    fn test_extracts_bare_json() {
        let value = extract_json_object("{\"a\": 1}").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_rejects_text_without_object() {
        assert!(extract_json_object("no braces here").is_err());
        assert!(extract_json_object("only open {").is_err());
        assert!(extract_json_object("} reversed {").is_err());
    }

    #[test]
    fn test_rejects_invalid_json_between_braces() {
        assert!(extract_json_object("{not valid json}").is_err());
    }
}
